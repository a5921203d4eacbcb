use std::collections::{BTreeMap, HashMap};

use async_std::sync::{Arc, Mutex};
use tracing::info;

use crate::raft::raft_common_proto::{EntryId, Server};

// Records what every member of a cluster observed over its lifetime and
// cross-checks those observations. A healthy history has no term for which
// two members acknowledged different leaders, and no log index at which two
// members applied different contents.
pub struct Diagnostics {
    servers: HashMap<String, Arc<Mutex<ServerDiagnostics>>>,

    // Leader agreement established so far, by term.
    leaders: BTreeMap<u64, Server>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics {
            servers: HashMap::new(),
            leaders: BTreeMap::new(),
        }
    }

    // Hands out the recorder for the supplied server, creating it on
    // first sight.
    pub fn for_server(&mut self, server: &Server) -> Arc<Mutex<ServerDiagnostics>> {
        self.servers
            .entry(server_key(server))
            .or_insert_with(|| Arc::new(Mutex::new(ServerDiagnostics::new())))
            .clone()
    }

    // The leader of the highest term any server has acknowledged so far,
    // along with that term.
    pub async fn latest_leader(&self) -> Option<(u64, Server)> {
        let mut best: Option<(u64, Server)> = None;
        for server in self.servers.values() {
            let locked = server.lock().await;
            if let Some((term, leader)) = locked.latest() {
                let newer = best.as_ref().map_or(true, |(t, _)| term > *t);
                if newer {
                    best = Some((term, leader));
                }
            }
        }
        best
    }

    // Runs every cross-check over the histories recorded so far.
    pub async fn validate(&mut self) -> Result<(), String> {
        self.validate_leaders().await?;
        self.validate_applied_logs().await?;
        Ok(())
    }

    // Checks that the per-server leader histories are compatible, term by
    // term. A term only gets checked once every server has moved past it,
    // and checked terms are cached so later runs skip them.
    async fn validate_leaders(&mut self) -> Result<(), String> {
        if self.servers.is_empty() {
            return Ok(());
        }

        let mut term = self.leaders.last_key_value().map(|(k, _)| *k).unwrap_or(0);
        loop {
            term += 1;

            let mut agreed: Option<Server> = None;
            for server in self.servers.values() {
                let locked = server.lock().await;
                if locked.latest_term().unwrap_or(0) < term {
                    // This server hasn't gotten this far yet, stop here.
                    return Ok(());
                }

                // Skipping a term entirely is normal, e.g. for failed elections.
                let Some(leader) = locked.leaders.get(&term) else {
                    continue;
                };

                match &agreed {
                    None => agreed = Some(leader.clone()),
                    Some(existing) if existing != leader => {
                        return Err(format!("Conflicting leaders recorded for term {}", term));
                    }
                    Some(_) => (),
                }
            }

            // Every server has moved past this term. The term may well have
            // ended without any leader at all.
            info!(term, leader = ?agreed, "leader agreement checked");
            if let Some(leader) = agreed {
                self.leaders.insert(term, leader);
            }
        }
    }

    // Checks the applied histories against each other. An index applied on
    // two servers must carry identical contents on both, and each server
    // must have applied a gap-free prefix of the log.
    async fn validate_applied_logs(&mut self) -> Result<(), String> {
        let mut reference: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
        for (key, server) in &self.servers {
            let locked = server.lock().await;

            if let Some((last, _)) = locked.applied.last_key_value() {
                if *last != locked.applied.len() as u64 {
                    return Err(format!(
                        "Server {} applied {} entries but reached index {}",
                        key,
                        locked.applied.len(),
                        last
                    ));
                }
            }

            for (index, value) in &locked.applied {
                match reference.get(index) {
                    None => {
                        reference.insert(*index, *value);
                    }
                    Some(existing) if existing != value => {
                        return Err(format!(
                            "Incompatible applied entry at index {}: {:?} vs {:?}",
                            index, existing, value
                        ));
                    }
                    Some(_) => (),
                }
            }
        }
        Ok(())
    }
}

// The observations of a single member, reported as the member runs.
pub struct ServerDiagnostics {
    // The leader this member acknowledged, by term.
    leaders: BTreeMap<u64, Server>,

    // The (term, fingerprint) this member applied, by log index.
    applied: BTreeMap<u64, (u64, u64)>,
}

impl ServerDiagnostics {
    fn new() -> Self {
        ServerDiagnostics {
            leaders: BTreeMap::new(),
            applied: BTreeMap::new(),
        }
    }

    // Records that this member acknowledged the supplied leader for the term.
    pub fn report_leader(&mut self, term: u64, leader: &Server) {
        if let Some(existing) = self.leaders.get(&term) {
            assert_eq!(existing, leader, "Leader for term {} changed", term);
        }
        self.leaders.insert(term, leader.clone());
    }

    // Records that this member applied an entry. Re-reporting an index is
    // legal (a server restarted without durable state replays its prefix)
    // but must carry identical contents.
    pub fn report_applied(&mut self, entry_id: &EntryId, fingerprint: u64) {
        let value = (entry_id.term, fingerprint);
        let existing = self.applied.get(&entry_id.index);
        assert!(
            existing.is_none() || existing == Some(&value),
            "Applied entry at index {} changed",
            entry_id.index
        );
        self.applied.insert(entry_id.index, value);
    }

    fn latest_term(&self) -> Option<u64> {
        self.leaders.last_key_value().map(|(k, _)| *k)
    }

    fn latest(&self) -> Option<(u64, Server)> {
        self.leaders.last_key_value().map(|(k, v)| (*k, v.clone()))
    }
}

fn server_key(server: &Server) -> String {
    format!("{}:{}", server.host, server.port)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        alpha: Server,
        beta: Server,
        gamma: Server,
        diag: Diagnostics,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                alpha: make_server("alpha"),
                beta: make_server("beta"),
                gamma: make_server("gamma"),
                diag: Diagnostics::new(),
            }
        }
    }

    async fn record_leader(diag: &mut Diagnostics, on: &Server, term: u64, leader: &Server) {
        diag.for_server(on).lock().await.report_leader(term, leader);
    }

    async fn record_applied(diag: &mut Diagnostics, on: &Server, id: EntryId, fingerprint: u64) {
        diag.for_server(on).lock().await.report_applied(&id, fingerprint);
    }

    #[tokio::test]
    #[should_panic]
    async fn test_conflicting_leader_report_panics() {
        let mut f = Fixture::new();
        record_leader(&mut f.diag, &f.alpha, 1, &f.alpha).await;
        record_leader(&mut f.diag, &f.alpha, 1, &f.beta).await;
    }

    #[tokio::test]
    async fn test_validate_happy() {
        let mut f = Fixture::new();
        record_leader(&mut f.diag, &f.alpha, 2, &f.alpha).await;
        record_leader(&mut f.diag, &f.beta, 2, &f.alpha).await;

        f.diag.validate().await.expect("validate");
    }

    #[tokio::test]
    async fn test_validate_failure() {
        let mut f = Fixture::new();
        record_leader(&mut f.diag, &f.alpha, 1, &f.alpha).await;
        record_leader(&mut f.diag, &f.beta, 1, &f.alpha).await;
        record_leader(&mut f.diag, &f.gamma, 1, &f.alpha).await;

        // The members no longer agree in term 2.
        record_leader(&mut f.diag, &f.alpha, 2, &f.beta).await;
        record_leader(&mut f.diag, &f.beta, 2, &f.beta).await;
        record_leader(&mut f.diag, &f.gamma, 2, &f.gamma).await;

        assert!(f.diag.validate().await.is_err());
    }

    #[tokio::test]
    async fn test_validate_skips_gaps() {
        let mut f = Fixture::new();
        record_leader(&mut f.diag, &f.alpha, 1, &f.alpha).await;
        record_leader(&mut f.diag, &f.beta, 1, &f.alpha).await;
        record_leader(&mut f.diag, &f.gamma, 1, &f.alpha).await;

        // Several leaderless terms pass, then a conflict shows up.
        record_leader(&mut f.diag, &f.alpha, 6, &f.beta).await;
        record_leader(&mut f.diag, &f.beta, 6, &f.beta).await;
        record_leader(&mut f.diag, &f.gamma, 6, &f.gamma).await;

        assert!(f.diag.validate().await.is_err());
    }

    #[tokio::test]
    async fn test_latest_leader() {
        let mut f = Fixture::new();
        assert!(f.diag.latest_leader().await.is_none());

        record_leader(&mut f.diag, &f.alpha, 1, &f.alpha).await;
        record_leader(&mut f.diag, &f.beta, 1, &f.alpha).await;
        record_leader(&mut f.diag, &f.beta, 3, &f.beta).await;

        let (term, leader) = f.diag.latest_leader().await.unwrap();
        assert_eq!(3, term);
        assert_eq!(f.beta, leader);
    }

    #[tokio::test]
    async fn test_validate_applied_happy() {
        let mut f = Fixture::new();
        record_applied(&mut f.diag, &f.alpha, entry_id(1, 1), 17).await;
        record_applied(&mut f.diag, &f.alpha, entry_id(1, 2), 18).await;
        record_applied(&mut f.diag, &f.beta, entry_id(1, 1), 17).await;

        f.diag.validate().await.expect("validate");
    }

    #[tokio::test]
    async fn test_validate_applied_divergence() {
        let mut f = Fixture::new();

        // Both applied index 1, but under different terms.
        record_applied(&mut f.diag, &f.alpha, entry_id(1, 1), 17).await;
        record_applied(&mut f.diag, &f.beta, entry_id(2, 1), 17).await;

        assert!(f.diag.validate().await.is_err());
    }

    #[tokio::test]
    async fn test_validate_applied_gap() {
        let mut f = Fixture::new();
        record_applied(&mut f.diag, &f.alpha, entry_id(1, 1), 17).await;
        record_applied(&mut f.diag, &f.alpha, entry_id(1, 3), 19).await;

        assert!(f.diag.validate().await.is_err());
    }

    fn entry_id(term: u64, index: u64) -> EntryId {
        EntryId { term, index }
    }

    fn make_server(name: &str) -> Server {
        Server {
            host: name.to_string(),
            port: 701,
            name: name.to_string(),
        }
    }
}
