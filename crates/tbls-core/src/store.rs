//! Persistence of key-share and signature-share records
//!
//! Records are YAML documents with base64 binary fields. Key material is
//! written owner-readable only on Unix.

use crate::mpc::PartyEndpoint;
use crate::provider::ProviderFactory;
use crate::{Error, KeyShareRecord, PartyId, Result, ShareBytes, SignatureShareRecord};
use chrono::Local;
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, instrument};

/// Writes records into one directory under timestamp-derived names
#[derive(Debug, Clone)]
pub struct ShareStore {
    dir: PathBuf,
}

impl ShareStore {
    /// Store writing into `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode a key generation result and write it as `config_<ts>.yml`
    pub fn save_shares(
        &self,
        threshold: usize,
        total_parties: usize,
        threshold_pk: &[u8],
        shares: &[Option<ShareBytes>],
    ) -> Result<(KeyShareRecord, PathBuf)> {
        let record = KeyShareRecord::new(threshold, total_parties, threshold_pk, shares)?;
        let path = self.save(&record)?;
        Ok((record, path))
    }

    /// Write `record` as `config_<ts>.yml`
    pub fn save(&self, record: &KeyShareRecord) -> Result<PathBuf> {
        let path = self.path_for("config")?;
        write_record(&path, record)?;
        Ok(path)
    }

    /// Write one `config_<ts>_<id>.yml` per party, each holding only that
    /// party's share
    pub fn save_per_party(&self, record: &KeyShareRecord) -> Result<Vec<PathBuf>> {
        record.validate()?;
        let stamp = timestamp();
        let mut paths = Vec::with_capacity(record.shares.len());
        for entry in &record.shares {
            let path = self.path_with_stamp("config", &stamp, Some(entry.party_id))?;
            write_record(&path, &record.for_party(entry.party_id)?)?;
            paths.push(path);
        }
        Ok(paths)
    }

    /// Write a signature-share record as `sigs_<ts>.yml`
    pub fn save_signatures(&self, record: &SignatureShareRecord) -> Result<PathBuf> {
        if record.sigs.is_empty() {
            return Err(Error::EmptyInput("no signature shares to save".into()));
        }
        let path = self.path_for("sigs")?;
        write_yaml(&path, record)?;
        info!(path = %path.display(), sigs = record.sigs.len(), "Signature shares saved");
        Ok(path)
    }

    fn path_for(&self, prefix: &str) -> Result<PathBuf> {
        self.path_with_stamp(prefix, &timestamp(), None)
    }

    fn path_with_stamp(&self, prefix: &str, stamp: &str, party: Option<PartyId>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let name = match party {
            Some(id) => format!("{}_{}_{}.yml", prefix, stamp, id),
            None => format!("{}_{}.yml", prefix, stamp),
        };
        Ok(self.dir.join(name))
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Write a key-share record to `path`
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_record(path: &Path, record: &KeyShareRecord) -> Result<()> {
    record.validate()?;
    write_yaml(path, record)?;
    info!(
        shares = record.shares.len(),
        threshold = record.threshold,
        "Key share record saved"
    );
    Ok(())
}

fn write_yaml<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_yaml::to_string(value).map_err(|e| Error::Serialization(e.to_string()))?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_yaml::from_str(&contents)?)
}

/// Read and validate a key-share record
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load(path: impl AsRef<Path>) -> Result<KeyShareRecord> {
    let record: KeyShareRecord = read_yaml(path.as_ref())?;
    record.validate()?;
    debug!(shares = record.shares.len(), "Key share record loaded");
    Ok(record)
}

/// Read and validate a signature-share record
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_signatures(path: impl AsRef<Path>) -> Result<SignatureShareRecord> {
    let record: SignatureShareRecord = read_yaml(path.as_ref())?;
    if record.sigs.is_empty() {
        return Err(Error::EmptyRecord("sigs".into()));
    }
    record
        .decode()
        .and(record.threshold_public_key_bytes())
        .map_err(|e| Error::Format(e.to_string()))?;
    debug!(sigs = record.sigs.len(), "Signature share record loaded");
    Ok(record)
}

/// Rebuild the party holding `record.shares[index]` from its persisted
/// share, without any key generation messaging
#[instrument(skip(record, factory))]
pub fn reconstruct_party<F: ProviderFactory>(
    record: &KeyShareRecord,
    index: usize,
    factory: &F,
) -> Result<PartyEndpoint<F::Party>> {
    let (party_id, share) = record.share(index)?;
    if party_id as usize >= record.total_parties {
        return Err(Error::InvalidPartyId(party_id));
    }

    let span = info_span!("party", id = party_id);
    let provider = factory.new_party(party_id, span.clone());
    let endpoint = PartyEndpoint::new(party_id, span, provider)?;
    endpoint.set_share_data(&share)?;

    if endpoint.threshold_pk()? != record.threshold_public_key_bytes()? {
        return Err(Error::Format(format!(
            "share of party {} belongs to a different threshold public key",
            party_id
        )));
    }

    debug!(party_id, "Party reconstructed");
    Ok(endpoint)
}
