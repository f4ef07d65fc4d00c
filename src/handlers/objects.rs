use super::{AppContext, Outcome, Reply};
use crate::errors::AppResult;
use crate::identity::IdentityProvider;
use crate::log_data;
use crate::session::SessionStore;
use crate::storage::ObjectStore;

impl<S, O, I> AppContext<'_, S, O, I>
where
    S: SessionStore,
    O: ObjectStore,
    I: IdentityProvider,
{
    /// `GET /objects`: serves the object named by a signed link. The link
    /// is the only credential; no session is required.
    pub async fn serve_object(&self) -> AppResult<Outcome> {
        let key = match self.signer.verify(&self.origin, self.now) {
            Ok(key) => key,
            Err(error) => {
                self.logger.warn(
                    "Rejected object link",
                    log_data!("error" => error.to_string()),
                );
                return Ok(Outcome::text(403, "Forbidden"));
            }
        };

        match self.objects.get(&key).await? {
            Some(object) => Ok(Outcome {
                reply: Reply::Object(object),
                cookie: None,
            }),
            None => Ok(Outcome::text(404, "Not Found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use futures::executor::block_on;
    use worker::Url;

    use super::super::harness::{now, Harness};
    use super::*;
    use crate::constants::VIEW_URL_TTL_SECS;

    fn link(harness: &Harness, key: &str) -> Url {
        harness
            .signer
            .sign(key, VIEW_URL_TTL_SECS, now())
            .unwrap()
            .to_url(&Url::parse("https://vault.test/").unwrap())
            .unwrap()
    }

    #[test]
    fn valid_link_serves_the_object_without_a_session() {
        let harness = Harness::signed_out();
        harness.objects.insert("alice/report.txt", "hello");
        let mut context = harness.context();
        context.origin = link(&harness, "alice/report.txt");

        let outcome = block_on(context.serve_object()).unwrap();
        match outcome.reply {
            Reply::Object(object) => {
                assert_eq!(object.bytes, b"hello".to_vec());
                assert_eq!(object.content_type.as_deref(), Some("text/plain"));
            }
            other => panic!("expected the object, got {:?}", other),
        }
    }

    #[test]
    fn tampered_or_expired_links_are_forbidden() {
        let harness = Harness::signed_out();
        harness.objects.insert("alice/report.txt", "hello");
        harness.objects.insert("bob/report.txt", "bob");

        let mut tampered = link(&harness, "alice/report.txt");
        let query = tampered
            .query()
            .unwrap_or_default()
            .replace("alice", "bob");
        tampered.set_query(Some(&query));
        let mut context = harness.context();
        context.origin = tampered;
        assert_eq!(block_on(context.serve_object()).unwrap().status_code(), 403);

        let mut context = harness.context();
        context.origin = link(&harness, "alice/report.txt");
        context.now = now() + Duration::seconds(VIEW_URL_TTL_SECS);
        assert_eq!(block_on(context.serve_object()).unwrap().status_code(), 403);
    }

    #[test]
    fn missing_object_is_not_found() {
        let harness = Harness::signed_out();
        let mut context = harness.context();
        context.origin = link(&harness, "alice/gone.txt");
        assert_eq!(block_on(context.serve_object()).unwrap().status_code(), 404);
    }
}
