//! # Dashboard Operations
//!
//! Everything the signed-in user can do with their files. All keys live
//! under the user prefix `<username>/`; keys sent back by the browser are
//! checked against it before any storage call.
//!
//! | Operation | Storage calls |
//! |-----------|---------------|
//! | list      | list-by-prefix, following the cursor to the end |
//! | upload    | put `<username>/<file name>` (same name overwrites) |
//! | delete    | delete key, then best-effort delete `<key>_summary.txt` |
//! | view      | signed URL, 5 minutes |
//! | summary   | signed URL for `<key>_summary.txt`, 60 seconds, then fetch |
//!
//! The summary fetch is done in-process: the worker verifies the link it
//! just issued and reads the object the link names, instead of requesting
//! its own `/objects` URL. A link that fails verification is an error like
//! any other fetch failure.
//!
//! Nothing is retried. The caller re-lists after every mutation.

use chrono::{DateTime, Utc};
use worker::Url;

use crate::constants::{SUMMARY_URL_TTL_SECS, VIEW_URL_TTL_SECS};
use crate::errors::{AppError, AppResult};
use crate::log_data;
use crate::logging::Logger;
use crate::models::{is_summary_key, summary_key_for, FileEntry, UploadCandidate, UserRecord};
use crate::signing::UrlSigner;
use crate::storage::ObjectStore;
use crate::utils::validate_file_name;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SummaryOutcome {
    Ready(String),
    /// No summary object yet; the summarizer runs asynchronously.
    Pending,
}

pub struct Dashboard<'a, S: ObjectStore> {
    store: &'a S,
    signer: &'a UrlSigner,
    logger: &'a Logger,
    prefix: String,
    origin: Url,
    max_upload_size: u64,
}

impl<'a, S: ObjectStore> Dashboard<'a, S> {
    /// Scopes the dashboard to `user`. A user without a usable identifier
    /// is rejected rather than given a shared namespace.
    pub fn new(
        store: &'a S,
        signer: &'a UrlSigner,
        logger: &'a Logger,
        user: &UserRecord,
        origin: Url,
        max_upload_size: u64,
    ) -> AppResult<Self> {
        let username = user.username.trim();
        if username.is_empty() {
            return Err(AppError::UnknownIdentity(
                "session has no username".to_string(),
            ));
        }
        if username.contains('/') || username == "." || username == ".." {
            return Err(AppError::UnknownIdentity(format!(
                "username {:?} cannot be used as a storage prefix",
                username
            )));
        }

        Ok(Self {
            store,
            signer,
            logger,
            prefix: format!("{}/", username),
            origin,
            max_upload_size,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Lists the user's primary objects. Summary objects are never listed.
    pub async fn list(&self) -> AppResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .store
                .list_page(&self.prefix, cursor.as_deref())
                .await?;
            entries.extend(
                page.objects
                    .into_iter()
                    .filter(|object| !object.is_summary())
                    .map(|object| FileEntry {
                        name: object
                            .key
                            .strip_prefix(&self.prefix)
                            .unwrap_or(&object.key)
                            .to_string(),
                        key: object.key,
                        last_modified: object.last_modified,
                        size: object.size,
                    }),
            );

            match page.cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(AppError::Backend(
                        "listing cursor did not advance".to_string(),
                    ));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(entries)
    }

    /// Stores the selected file at `<username>/<file name>` and returns the key.
    pub async fn upload(&self, candidate: Option<UploadCandidate>) -> AppResult<String> {
        let candidate =
            candidate.ok_or_else(|| AppError::BadRequest("no file selected".to_string()))?;
        let file_name = validate_file_name(&candidate.file_name)?;
        if is_summary_key(file_name) {
            return Err(AppError::BadRequest(
                "file names ending in _summary.txt are reserved".to_string(),
            ));
        }
        if candidate.size() > self.max_upload_size {
            return Err(AppError::FileTooLarge {
                size: candidate.size(),
                max: self.max_upload_size,
            });
        }

        let key = format!("{}{}", self.prefix, file_name);
        let size = candidate.size();
        let content_type = if candidate.content_type.trim().is_empty() {
            "application/octet-stream"
        } else {
            candidate.content_type.as_str()
        };
        self.store.put(&key, candidate.bytes, content_type).await?;

        self.logger.info(
            "File uploaded",
            log_data!("key" => key, "size" => size),
        );
        Ok(key)
    }

    /// Deletes a primary object and then its summary. A failure to delete
    /// the summary is logged and ignored.
    pub async fn delete(&self, key: &str, confirmation: Confirmation) -> AppResult<()> {
        self.check_primary_key(key)?;
        if confirmation == Confirmation::Declined {
            return Err(AppError::Cancelled(format!("delete of {} not confirmed", key)));
        }

        self.store.delete(key).await?;

        let summary_key = summary_key_for(key);
        if let Err(error) = self.store.delete(&summary_key).await {
            self.logger.warn(
                "Summary delete failed",
                log_data!("key" => summary_key, "error" => error.to_string()),
            );
        }

        self.logger.info("File deleted", log_data!("key" => key));
        Ok(())
    }

    /// Link for opening the object in a new tab.
    pub fn view(&self, key: &str, now: DateTime<Utc>) -> AppResult<Url> {
        self.check_primary_key(key)?;
        self.signer
            .sign(key, VIEW_URL_TTL_SECS, now)?
            .to_url(&self.origin)
    }

    /// Fetches the generated summary of `key` through a short-lived link,
    /// resolved in-process.
    pub async fn summary(&self, key: &str, now: DateTime<Utc>) -> AppResult<SummaryOutcome> {
        self.check_primary_key(key)?;

        let link = self
            .signer
            .sign(&summary_key_for(key), SUMMARY_URL_TTL_SECS, now)?
            .to_url(&self.origin)?;
        let summary_key = self.signer.verify(&link, now)?;

        match self.store.get(&summary_key).await? {
            Some(body) => Ok(SummaryOutcome::Ready(
                String::from_utf8_lossy(&body.bytes).into_owned(),
            )),
            None => Ok(SummaryOutcome::Pending),
        }
    }

    fn check_primary_key(&self, key: &str) -> AppResult<()> {
        let Some(name) = key.strip_prefix(&self.prefix) else {
            return Err(AppError::BadRequest(format!(
                "{} is outside the user's files",
                key
            )));
        };
        if name.is_empty() || name.split('/').any(|segment| segment == "..") {
            return Err(AppError::BadRequest(format!("{} is not a file key", key)));
        }
        if is_summary_key(key) {
            return Err(AppError::BadRequest(format!(
                "{} is a summary, not a file",
                key
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use futures::executor::block_on;

    use super::*;
    use crate::storage::memory::MemoryStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()
    }

    fn signer() -> UrlSigner {
        UrlSigner::new(b"0123456789abcdef0123456789abcdef".to_vec())
    }

    fn logger() -> Logger {
        Logger::new("test".to_string())
    }

    fn origin() -> Url {
        Url::parse("https://vault.test/dashboard").unwrap()
    }

    fn dashboard<'a>(
        store: &'a MemoryStore,
        signer: &'a UrlSigner,
        logger: &'a Logger,
        username: &str,
    ) -> Dashboard<'a, MemoryStore> {
        Dashboard::new(store, signer, logger, &UserRecord::new(username), origin(), 1024).unwrap()
    }

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[test]
    fn missing_username_is_unknown_identity() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        for username in ["", "   ", "a/b", ".."] {
            let result = Dashboard::new(
                &store,
                &signer,
                &logger,
                &UserRecord::new(username),
                origin(),
                1024,
            );
            assert!(matches!(result, Err(AppError::UnknownIdentity(_))));
        }
    }

    #[test]
    fn list_hides_summaries_and_other_users() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("alice/a.txt", "a");
        store.insert("alice/a.txt_summary.txt", "summary of a");
        store.insert("alice/b.pdf", "b");
        store.insert("bob/secret.txt", "s");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        let entries = block_on(dashboard.list()).unwrap();
        assert_eq!(names(&entries), vec!["a.txt", "b.pdf"]);
        assert_eq!(entries[0].key, "alice/a.txt");
        assert!(entries.iter().all(|entry| !is_summary_key(&entry.key)));
    }

    #[test]
    fn list_follows_the_cursor_past_the_first_page() {
        let store = MemoryStore::with_page_size(2);
        let (signer, logger) = (signer(), logger());
        for i in 0..5 {
            store.insert(&format!("alice/file-{}.txt", i), "x");
        }
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        let entries = block_on(dashboard.list()).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(*store.list_calls.borrow(), 3);
    }

    #[test]
    fn upload_stores_under_user_prefix_and_overwrites() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        let key = block_on(dashboard.upload(Some(UploadCandidate::new(
            "report.pdf",
            "application/pdf",
            b"v1".to_vec(),
        ))))
        .unwrap();
        assert_eq!(key, "alice/report.pdf");

        block_on(dashboard.upload(Some(UploadCandidate::new(
            "report.pdf",
            "application/pdf",
            b"version two".to_vec(),
        ))))
        .unwrap();

        let entries = block_on(dashboard.list()).unwrap();
        assert_eq!(names(&entries), vec!["report.pdf"]);
        assert_eq!(entries[0].size, 11);
    }

    #[test]
    fn upload_without_selection_is_rejected() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        let dashboard = dashboard(&store, &signer, &logger, "alice");
        assert!(matches!(
            block_on(dashboard.upload(None)),
            Err(AppError::BadRequest(_))
        ));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn upload_rejects_oversized_and_reserved_names() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        let too_big = UploadCandidate::new("big.bin", "", vec![0; 2048]);
        assert!(matches!(
            block_on(dashboard.upload(Some(too_big))),
            Err(AppError::FileTooLarge { size: 2048, max: 1024 })
        ));

        let reserved = UploadCandidate::new("x_summary.txt", "text/plain", b"x".to_vec());
        assert!(matches!(
            block_on(dashboard.upload(Some(reserved))),
            Err(AppError::BadRequest(_))
        ));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn upload_keeps_distinct_names_apart() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        for name in ["a?.txt", "a.txt", "Q1: plan?.txt", "Q1 plan.txt"] {
            let key = block_on(dashboard.upload(Some(UploadCandidate::new(
                name,
                "text/plain",
                name.as_bytes().to_vec(),
            ))))
            .unwrap();
            assert_eq!(key, format!("alice/{}", name));
        }

        let entries = block_on(dashboard.list()).unwrap();
        let mut listed = names(&entries);
        listed.sort_unstable();
        assert_eq!(listed, vec!["Q1 plan.txt", "Q1: plan?.txt", "a.txt", "a?.txt"]);
    }

    #[test]
    fn upload_refuses_names_that_leave_the_prefix() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        let dashboard = dashboard(&store, &signer, &logger, "alice");
        for name in ["../bob/notes.txt", "..", "line\nbreak.txt"] {
            assert!(matches!(
                block_on(dashboard.upload(Some(UploadCandidate::new(
                    name,
                    "text/plain",
                    b"n".to_vec(),
                )))),
                Err(AppError::BadRequest(_))
            ));
        }
        assert!(store.keys().is_empty());
    }

    #[test]
    fn delete_removes_file_and_summary() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("alice/a.txt", "a");
        store.insert("alice/a.txt_summary.txt", "summary");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        block_on(dashboard.delete("alice/a.txt", Confirmation::Confirmed)).unwrap();

        assert!(store.keys().is_empty());
        assert!(block_on(dashboard.list()).unwrap().is_empty());
    }

    #[test]
    fn delete_succeeds_without_a_summary() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("alice/a.txt", "a");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        assert!(block_on(dashboard.delete("alice/a.txt", Confirmation::Confirmed)).is_ok());
        assert!(!store.contains("alice/a.txt"));
    }

    #[test]
    fn failed_summary_delete_is_swallowed() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("alice/a.txt", "a");
        store.insert("alice/a.txt_summary.txt", "summary");
        store.fail("delete", "alice/a.txt_summary.txt");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        assert!(block_on(dashboard.delete("alice/a.txt", Confirmation::Confirmed)).is_ok());
        assert!(!store.contains("alice/a.txt"));
        // The orphan stays and is still hidden from the list.
        assert!(store.contains("alice/a.txt_summary.txt"));
        assert!(block_on(dashboard.list()).unwrap().is_empty());
    }

    #[test]
    fn failed_primary_delete_is_reported() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("alice/a.txt", "a");
        store.fail("delete", "alice/a.txt");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        assert!(matches!(
            block_on(dashboard.delete("alice/a.txt", Confirmation::Confirmed)),
            Err(AppError::Backend(_))
        ));
    }

    #[test]
    fn declined_delete_touches_nothing() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("alice/a.txt", "a");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        assert!(matches!(
            block_on(dashboard.delete("alice/a.txt", Confirmation::Declined)),
            Err(AppError::Cancelled(_))
        ));
        assert!(store.contains("alice/a.txt"));
    }

    #[test]
    fn keys_outside_the_prefix_are_refused() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("bob/secret.txt", "s");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        for key in ["bob/secret.txt", "alice/", "alice/../bob/secret.txt", "alicex/a"] {
            assert!(matches!(
                block_on(dashboard.delete(key, Confirmation::Confirmed)),
                Err(AppError::BadRequest(_))
            ));
            assert!(dashboard.view(key, now()).is_err());
        }
        assert!(store.contains("bob/secret.txt"));
    }

    #[test]
    fn view_link_is_valid_for_five_minutes() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.insert("alice/a.txt", "a");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        let link = dashboard.view("alice/a.txt", now()).unwrap();
        assert_eq!(link.path(), "/objects");
        assert_eq!(signer.verify(&link, now() + Duration::seconds(299)).unwrap(), "alice/a.txt");
        assert!(signer.verify(&link, now() + Duration::seconds(300)).is_err());
    }

    #[test]
    fn summary_failure_from_backend_is_an_error() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        store.fail("get", "alice/a.txt_summary.txt");
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        assert!(matches!(
            block_on(dashboard.summary("alice/a.txt", now())),
            Err(AppError::Backend(_))
        ));
    }

    #[test]
    fn upload_then_summary_once_the_backend_catches_up() {
        let (store, signer, logger) = (MemoryStore::new(), signer(), logger());
        let dashboard = dashboard(&store, &signer, &logger, "alice");

        block_on(dashboard.upload(Some(UploadCandidate::new(
            "report.pdf",
            "application/pdf",
            b"%PDF".to_vec(),
        ))))
        .unwrap();
        let entries = block_on(dashboard.list()).unwrap();
        assert_eq!(entries[0].key, "alice/report.pdf");

        assert_eq!(
            block_on(dashboard.summary("alice/report.pdf", now())).unwrap(),
            SummaryOutcome::Pending
        );

        // The external summarizer finishes.
        store.insert("alice/report.pdf_summary.txt", "Quarterly numbers are up.");

        assert_eq!(
            block_on(dashboard.summary("alice/report.pdf", now())).unwrap(),
            SummaryOutcome::Ready("Quarterly numbers are up.".to_string())
        );
        assert_eq!(names(&block_on(dashboard.list()).unwrap()), vec!["report.pdf"]);
    }
}
