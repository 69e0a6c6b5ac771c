//! Audio attachments stored on the local filesystem, one directory per owner.

use std::path::{Path, PathBuf};

use db::{
    DBService, StoreError,
    models::couple::Couple,
    policy::{Actor, Operation, RowPolicy, authorize},
};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_EXTENSION: &str = "mp3";

#[derive(Debug, Error)]
pub enum AudioError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("File must be an audio file")]
    UnsupportedType,
    #[error("Audio file exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Invalid audio object name")]
    InvalidName,
    #[error("audio file not found")]
    NotFound,
}

/// A stored audio file. Readable by its owner and the owner's partner.
#[derive(Debug, Clone)]
pub struct AudioObject {
    pub owner: Uuid,
    pub name: String,
    pub owner_partner: Option<Uuid>,
}

impl RowPolicy for AudioObject {
    const RESOURCE: &'static str = "audio object";

    fn permits(&self, actor: &Actor, op: Operation) -> bool {
        match op {
            Operation::Read => {
                actor.is(self.owner) || self.owner_partner.is_some_and(|partner| actor.is(partner))
            }
            Operation::Insert | Operation::Update | Operation::Delete => actor.is(self.owner),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AudioUpload {
    pub audio_url: String,
    pub filename: String,
}

#[derive(Clone)]
pub struct AudioStore {
    db: DBService,
    root: PathBuf,
}

impl AudioStore {
    pub fn new(db: DBService, root: PathBuf) -> Self {
        Self { db, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn upload(
        &self,
        actor: &Actor,
        content_type: Option<&str>,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<AudioUpload, AudioError> {
        let owner = actor
            .user_id()
            .ok_or_else(|| StoreError::Denied("cannot insert audio object".to_string()))?;
        if !content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("audio/")) {
            return Err(AudioError::UnsupportedType);
        }
        if bytes.len() > MAX_AUDIO_BYTES {
            return Err(AudioError::TooLarge {
                limit: MAX_AUDIO_BYTES,
            });
        }

        let object = AudioObject {
            owner,
            name: format!("{}.{}", Uuid::new_v4(), extension_of(original_name)),
            owner_partner: None,
        };
        authorize(&object, actor, Operation::Insert)?;

        let dir = self.root.join(owner.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&object.name), bytes).await?;

        info!(user_id = %owner, name = %object.name, size = bytes.len(), "Stored audio upload");
        Ok(AudioUpload {
            audio_url: format!("/api/audio/{}/{}", owner, object.name),
            filename: format!("{}/{}", owner, object.name),
        })
    }

    pub async fn read(&self, actor: &Actor, owner: Uuid, name: &str) -> Result<Vec<u8>, AudioError> {
        let object = self.object(owner, name).await?;
        authorize(&object, actor, Operation::Read)?;
        match tokio::fs::read(self.path_of(&object)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AudioError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, actor: &Actor, owner: Uuid, name: &str) -> Result<(), AudioError> {
        let object = self.object(owner, name).await?;
        authorize(&object, actor, Operation::Delete)?;
        match tokio::fs::remove_file(self.path_of(&object)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AudioError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn object(&self, owner: Uuid, name: &str) -> Result<AudioObject, AudioError> {
        if !is_valid_name(name) {
            return Err(AudioError::InvalidName);
        }
        Ok(AudioObject {
            owner,
            name: name.to_string(),
            owner_partner: Couple::partner_of(&self.db.pool, owner).await?,
        })
    }

    fn path_of(&self, object: &AudioObject) -> PathBuf {
        self.root.join(object.owner.to_string()).join(&object.name)
    }
}

/// Lowercased alphanumeric extension of the uploaded file name, `mp3` otherwise.
fn extension_of(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Names are always `<uuid>.<ext>`, which keeps them inside the owner's directory.
fn is_valid_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((stem, ext)) => {
            Uuid::parse_str(stem).is_ok()
                && !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use db::models::{couple::CouplePair, profile::Profile};

    use super::*;

    #[test]
    fn extensions_and_names() {
        assert_eq!(extension_of(Some("voice.M4A")), "m4a");
        assert_eq!(extension_of(Some("voice")), "mp3");
        assert_eq!(extension_of(Some("../../etc/passwd")), "mp3");
        assert_eq!(extension_of(None), "mp3");

        let good = format!("{}.webm", Uuid::new_v4());
        assert!(is_valid_name(&good));
        assert!(!is_valid_name("../secret.mp3"));
        assert!(!is_valid_name(&format!("{}.", Uuid::new_v4())));
        assert!(!is_valid_name(&format!("{}.mp3/..", Uuid::new_v4())));
    }

    #[tokio::test]
    async fn owner_and_partner_read_only_owner_deletes() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(db.clone(), dir.path().to_path_buf());

        let ana = Uuid::new_v4();
        let ben = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        {
            let mut conn = db.pool.acquire().await.unwrap();
            Profile::create(&mut conn, &Actor::User(ana), ana, "ana@example.com", None)
                .await
                .unwrap();
            Profile::create(&mut conn, &Actor::User(ben), ben, "ben@example.com", None)
                .await
                .unwrap();
        }
        Couple::create(&db.pool, &Actor::User(ana), CouplePair::new(ana, ben).unwrap())
            .await
            .unwrap();

        let upload = store
            .upload(&Actor::User(ana), Some("audio/mpeg"), Some("hello.mp3"), b"ID3 bytes")
            .await
            .unwrap();
        let (owner, name) = upload.filename.split_once('/').unwrap();
        assert_eq!(owner, ana.to_string());
        assert!(dir.path().join(owner).join(name).exists());

        assert_eq!(store.read(&Actor::User(ana), ana, name).await.unwrap(), b"ID3 bytes");
        assert_eq!(store.read(&Actor::User(ben), ana, name).await.unwrap(), b"ID3 bytes");
        let err = store.read(&Actor::User(stranger), ana, name).await.unwrap_err();
        assert!(matches!(err, AudioError::Store(StoreError::Denied(_))));

        let err = store.delete(&Actor::User(ben), ana, name).await.unwrap_err();
        assert!(matches!(err, AudioError::Store(StoreError::Denied(_))));
        store.delete(&Actor::User(ana), ana, name).await.unwrap();
        assert!(matches!(
            store.read(&Actor::User(ana), ana, name).await.unwrap_err(),
            AudioError::NotFound
        ));
    }

    #[tokio::test]
    async fn rejects_non_audio_and_oversized_uploads() {
        let db = DBService::new_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(db, dir.path().to_path_buf());
        let actor = Actor::User(Uuid::new_v4());

        let err = store.upload(&actor, Some("image/png"), Some("a.png"), b"png").await.unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedType));
        let err = store.upload(&actor, None, Some("a.mp3"), b"mp3").await.unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedType));

        let big = vec![0u8; MAX_AUDIO_BYTES + 1];
        let err = store.upload(&actor, Some("audio/wav"), None, &big).await.unwrap_err();
        assert!(matches!(err, AudioError::TooLarge { .. }));
    }
}
