use crate::core::Transaction;
use serde::{Deserialize, Serialize};

/// What a node advertises about itself during a handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version: String,
    pub height: i64,
    pub listen_addr: String,
    pub peer_list: Vec<String>,
}

/// One request per connection on the TCP transport.
#[derive(Debug, Serialize, Deserialize)]
pub enum Package {
    Handshake {
        version: Version,
    },
    Transaction {
        origin: String,
        addr_from: String,
        transaction: Transaction,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Version(Version),
    Ack,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::genesis_transaction;

    #[test]
    fn test_package_json_shape() {
        let pkg = Package::Handshake {
            version: Version {
                version: "ledger-0.1".to_string(),
                height: 3,
                listen_addr: "127.0.0.1:3000".to_string(),
                peer_list: vec!["127.0.0.1:4000".to_string()],
            },
        };
        let json = serde_json::to_value(&pkg).unwrap();
        assert_eq!(json["Handshake"]["version"]["height"], 3);
        assert_eq!(json["Handshake"]["version"]["peer_list"][0], "127.0.0.1:4000");
    }

    #[test]
    fn test_transaction_package_decodes() {
        let tx = genesis_transaction();
        let bytes = serde_json::to_vec(&Package::Transaction {
            origin: "o".to_string(),
            addr_from: "a".to_string(),
            transaction: tx.clone(),
        })
        .unwrap();
        match serde_json::from_slice::<Package>(&bytes).unwrap() {
            Package::Transaction {
                origin,
                addr_from,
                transaction,
            } => {
                assert_eq!(origin, "o");
                assert_eq!(addr_from, "a");
                assert_eq!(transaction, tx);
            }
            other => panic!("unexpected package {other:?}"),
        }
    }
}
