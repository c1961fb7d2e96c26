use serde::Serialize;

use crate::error::ClientError;
use crate::utils::{checksummed, parse_address, Address};

const UNISWAP_V3_FACTORY: &str = "0x1F98431c8aD98523631AE4a59f267346ea31F984";
const UNISWAP_POSITION_MANAGER: &str = "0xC36442b4a4522E871399CD717aBDD847Ab11FE88";
const UNISWAP_SWAP_ROUTER: &str = "0xE592427A0AEce92De3Edee1F18E0157C05861564";

struct NetworkDef {
    name: &'static str,
    aliases: &'static [&'static str],
    chain_id: u64,
    euler: Option<&'static str>,
}

static NETWORKS: [NetworkDef; 3] = [
    NetworkDef {
        name: "mainnet",
        aliases: &[],
        chain_id: 1,
        euler: Some("0x27182842E098f60e3D576794A5bFFb0777E025d3"),
    },
    NetworkDef {
        name: "goerli",
        aliases: &[],
        chain_id: 5,
        euler: Some("0x931172BB95549d0f29e10ae2D079ABA3C63318B3"),
    },
    NetworkDef {
        name: "arbitrum",
        aliases: &["arbitrumOne"],
        chain_id: 42161,
        euler: None,
    },
];

/// Contract addresses for one chain. RPC endpoints are deployment config
/// and never live here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub name: &'static str,
    pub chain_id: u64,
    #[serde(with = "checksummed")]
    pub uniswap_v3_factory: Address,
    #[serde(with = "checksummed")]
    pub position_manager: Address,
    #[serde(with = "checksummed")]
    pub swap_router: Address,
    #[serde(serialize_with = "checksummed::serialize_option")]
    pub euler: Option<Address>,
}

pub fn network_names() -> Vec<&'static str> {
    NETWORKS.iter().map(|def| def.name).collect()
}

pub fn network(name: &str) -> Result<Network, ClientError> {
    let def = NETWORKS
        .iter()
        .find(|def| def.name == name || def.aliases.iter().any(|alias| *alias == name))
        .ok_or_else(|| {
            ClientError::InvalidInput(format!(
                "unknown network {name:?}, expected one of {}",
                network_names().join(", ")
            ))
        })?;
    Ok(Network {
        name: def.name,
        chain_id: def.chain_id,
        uniswap_v3_factory: parse_address(UNISWAP_V3_FACTORY)?,
        position_manager: parse_address(UNISWAP_POSITION_MANAGER)?,
        swap_router: parse_address(UNISWAP_SWAP_ROUTER)?,
        euler: def.euler.map(parse_address).transpose()?,
    })
}

pub fn all_networks() -> Result<Vec<Network>, ClientError> {
    NETWORKS.iter().map(|def| network(def.name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_network_resolves() {
        let networks = all_networks().expect("static table parses");
        assert_eq!(networks.len(), 3);
        assert_eq!(
            networks.iter().map(|n| n.chain_id).collect::<Vec<_>>(),
            vec![1, 5, 42161]
        );
    }

    #[test]
    fn shares_uniswap_deployments() {
        let mainnet = network("mainnet").unwrap();
        let arbitrum = network("arbitrum").unwrap();
        assert_eq!(mainnet.position_manager, arbitrum.position_manager);
        assert_eq!(
            mainnet.position_manager.to_checksum(None),
            "0xC36442b4a4522E871399CD717aBDD847Ab11FE88"
        );
        assert!(arbitrum.euler.is_none());
        assert!(mainnet.euler.is_some());
    }

    #[test]
    fn serializes_checksummed_addresses() {
        let value = serde_json::to_value(network("goerli").unwrap()).unwrap();
        assert_eq!(value["chain_id"], 5);
        assert_eq!(
            value["uniswap_v3_factory"],
            "0x1F98431c8aD98523631AE4a59f267346ea31F984"
        );
        assert_eq!(value["euler"], "0x931172BB95549d0f29e10ae2D079ABA3C63318B3");
        let arbitrum = serde_json::to_value(network("arbitrum").unwrap()).unwrap();
        assert!(arbitrum["euler"].is_null());
    }

    #[test]
    fn alias_maps_to_canonical_name() {
        assert_eq!(network("arbitrumOne").unwrap().name, "arbitrum");
    }

    #[test]
    fn unknown_network_is_invalid_input() {
        let err = network("ropsten").unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert!(err.to_string().contains("mainnet"));
    }
}
