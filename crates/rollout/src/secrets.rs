//! Secret provisioning - static secrets and rekeyed credentials

use crate::context::{ProgressCallback, SecretService, Transport};
use crate::error::{Error, Result};
use crate::types::{DynamicCredential, Host, Secret, SudoPassword};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Size of a secret's source, resolved against `base_dir`
pub fn secret_size(secret: &Secret, base_dir: &Path) -> Result<u64> {
    let path = secret.resolve_source(base_dir);
    match fs::metadata(&path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound { path }),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Upload every declared secret of a host, in name order.
///
/// The first failure is returned; secrets after it are not attempted.
pub fn upload_static_secrets(
    transport: &dyn Transport,
    host: &Host,
    sudo_password: &SudoPassword,
    base_dir: &Path,
    progress: &mut dyn ProgressCallback,
) -> Result<()> {
    progress.on_secrets_start(host);

    for (name, secret) in &host.secrets {
        let size = secret_size(secret, base_dir)?;
        progress.on_secret_start(name, size);

        let result = transport.upload_secret(host, sudo_password, secret, base_dir);
        progress.on_secret_complete(name, result.is_ok());
        result?;

        log::debug!("Uploaded secret {name} to {}", host.hostname());
    }

    Ok(())
}

/// Rekey a host's dynamic credential and deliver it.
///
/// Every failure is reported as a warning and the host carries on without
/// the credential. The temporary credential file is removed after the
/// upload attempt whatever its outcome. Returns whether the credential
/// reached the host.
pub fn rekey_dynamic_credential<S: SecretService>(
    service: &S,
    session: &S::Session,
    transport: &dyn Transport,
    host: &Host,
    sudo_password: &SudoPassword,
    scratch_dir: &Path,
    progress: &mut dyn ProgressCallback,
) -> bool {
    let credential = match service.rekey(session, host) {
        Ok(credential) => credential,
        Err(err) => {
            warn(progress, &err);
            return false;
        }
    };

    let file = match write_credential_file(&credential, scratch_dir) {
        Ok(file) => file,
        Err(err) => {
            warn(progress, &err);
            return false;
        }
    };

    let destination = &host.vault.destination_file;
    let secret = Secret {
        source: file.path().to_path_buf(),
        destination: destination.path.clone(),
        owner: destination.owner.clone(),
        permissions: destination.permissions.clone(),
    };

    let uploaded = transport.upload_secret(host, sudo_password, &secret, scratch_dir);

    if let Err(e) = file.close() {
        log::warn!("Could not remove {}: {e}", secret.source.display());
    }

    match uploaded {
        Ok(()) => {
            log::info!("Rekeyed credential for {}", host.hostname());
            progress.on_credential_rekeyed(host);
            true
        }
        Err(err) => {
            warn(progress, &err);
            false
        }
    }
}

/// Write the credential to an owner-only temporary file
fn write_credential_file(credential: &DynamicCredential, dir: &Path) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("vault-")
        .suffix(".env")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;

    if let Err(e) = write_synced(&mut file, credential.to_env_file().as_bytes()) {
        return Err(Error::io(file.path(), e));
    }

    Ok(file)
}

fn write_synced(file: &mut NamedTempFile, contents: &[u8]) -> std::io::Result<()> {
    file.write_all(contents)?;
    file.flush()?;
    file.as_file().sync_all()
}

fn warn(progress: &mut dyn ProgressCallback, err: &Error) {
    log::warn!("{err}");
    progress.on_warning(err);
}
