use crate::raft::failure_injection::{ChannelInfo, FailureInjection, FailureInjectionMiddleware};
use crate::raft::raft_common_proto::Server;
use crate::raft::raft_service_proto::raft_client::RaftClient;
use std::collections::HashMap;
use tonic::transport::{Channel, Endpoint, Error};

// A client for one of our peers, with failure injection applied to the
// underlying channel.
pub type PeerClient = RaftClient<FailureInjectionMiddleware<Channel>>;

// The fixed membership of a cluster, as seen from one of its members.
// Tracks lazily created channels to each peer and the most recently
// observed leader.
pub struct Cluster {
    me: Server,
    others: Vec<Server>,
    channels: HashMap<String, Channel>,
    failures: FailureInjection,
    last_known_leader: Option<Server>,
}

impl Cluster {
    // Builds the membership view for one member, given the full roster. The
    // membership is fixed for the lifetime of the instance.
    pub fn new(me: Server, all: &[Server], failures: FailureInjection) -> Self {
        let mut map = HashMap::new();
        for server in all {
            let k = key(server);
            if k == key(&me) {
                continue;
            }
            map.insert(k, server.clone());
        }
        Cluster {
            me,
            others: map.into_values().collect(),
            channels: HashMap::new(),
            failures,
            last_known_leader: None,
        }
    }

    // The most recently observed leader, if any. May well be stale.
    pub fn leader(&self) -> Option<Server> {
        self.last_known_leader.clone()
    }

    // Notes a newly observed leader.
    pub fn observe_leader(&mut self, leader: &Server) {
        self.last_known_leader = Some(leader.clone());
    }

    // The address of the member this view belongs to.
    pub fn me(&self) -> Server {
        self.me.clone()
    }

    // The addresses of every member other than us.
    pub fn others(&self) -> Vec<Server> {
        self.others.to_vec()
    }

    // The total number of members, ourselves included.
    pub fn size(&self) -> usize {
        self.others.len() + 1
    }

    // Returns the number of members which must hold an entry (or grant a
    // vote) for it to count as accepted by the cluster.
    pub fn quorum_size(&self) -> usize {
        self.size() / 2 + 1
    }

    // An rpc client for talking to the supplied peer.
    pub fn new_client(&mut self, address: &Server) -> Result<PeerClient, Error> {
        let k = key(address);
        if let Some(channel) = self.channels.get(&k) {
            // Cloning a tonic channel is cheap and reuses the connection.
            return Ok(self.wrap(channel.clone(), address));
        }

        // Cache miss, create a new channel. Connecting lazily means this never
        // blocks, the connection is established on first use.
        let dst = format!("http://[{}]:{}", address.host, address.port);
        let channel = Endpoint::new(dst)?.connect_lazy();
        self.channels.insert(k, channel.clone());
        Ok(self.wrap(channel, address))
    }

    fn wrap(&self, channel: Channel, address: &Server) -> PeerClient {
        let info = ChannelInfo::new(key(&self.me), key(address));
        RaftClient::new(FailureInjectionMiddleware::new(
            channel,
            self.failures.clone(),
            info,
        ))
    }
}

fn key(server: &Server) -> String {
    format!("{}:{}", server.host, server.port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_self_from_others() {
        let members = make_members(3);
        let cluster = Cluster::new(members[0].clone(), &members, FailureInjection::none());

        assert_eq!(3, cluster.size());
        assert_eq!(2, cluster.others().len());
        assert!(!cluster.others().contains(&members[0]));
    }

    #[test]
    fn test_deduplicates_members() {
        let mut members = make_members(3);
        members.push(members[1].clone());
        let cluster = Cluster::new(members[0].clone(), &members, FailureInjection::none());

        assert_eq!(3, cluster.size());
    }

    #[test]
    fn test_quorum_size() {
        for (size, quorum) in [(1, 1), (2, 2), (3, 2), (4, 3), (5, 3)] {
            let members = make_members(size);
            let cluster = Cluster::new(members[0].clone(), &members, FailureInjection::none());
            assert_eq!(quorum, cluster.quorum_size(), "cluster size {}", size);
        }
    }

    #[test]
    fn test_records_leader() {
        let members = make_members(3);
        let mut cluster = Cluster::new(members[0].clone(), &members, FailureInjection::none());
        assert!(cluster.leader().is_none());

        cluster.observe_leader(&members[2]);
        assert_eq!(Some(members[2].clone()), cluster.leader());
    }

    fn make_members(count: usize) -> Vec<Server> {
        (0..count)
            .map(|i| Server {
                host: "::1".to_string(),
                port: 2000 + i as i32,
                name: format!("server-{}", i),
            })
            .collect()
    }
}
