//! Dogecoin network parameters

/// Dogecoin network selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    #[default]
    Dogecoin,
    DogecoinTestnet,
}

impl Network {
    pub fn from_testnet_flag(testnet: bool) -> Self {
        if testnet {
            Network::DogecoinTestnet
        } else {
            Network::Dogecoin
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Dogecoin)
    }

    /// Base58 version byte for pay-to-pubkey-hash addresses
    pub const fn pubkey_address_prefix(self) -> u8 {
        match self {
            Network::Dogecoin => 0x1e,
            Network::DogecoinTestnet => 0x71,
        }
    }

    /// Base58 version byte for pay-to-script-hash addresses
    pub const fn script_address_prefix(self) -> u8 {
        match self {
            Network::Dogecoin => 0x16,
            Network::DogecoinTestnet => 0xc4,
        }
    }

    /// Base58 version byte for WIF-encoded private keys
    pub const fn wif_prefix(self) -> u8 {
        match self {
            Network::Dogecoin => 0x9e,
            Network::DogecoinTestnet => 0xf1,
        }
    }

    /// SLIP-44 coin type used in the BIP44 derivation path
    pub const fn bip44_coin_type(self) -> u32 {
        match self {
            Network::Dogecoin => 3,
            Network::DogecoinTestnet => 1,
        }
    }

    /// dogecoind's default JSON-RPC port
    pub const fn default_rpc_port(self) -> u16 {
        match self {
            Network::Dogecoin => 22555,
            Network::DogecoinTestnet => 44555,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Network::Dogecoin => "dogecoin",
            Network::DogecoinTestnet => "dogecoin-testnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_differ_between_networks() {
        let main = Network::Dogecoin;
        let test = Network::DogecoinTestnet;
        assert_ne!(main.pubkey_address_prefix(), test.pubkey_address_prefix());
        assert_ne!(main.script_address_prefix(), test.script_address_prefix());
        assert_ne!(main.wif_prefix(), test.wif_prefix());
    }

    #[test]
    fn test_from_testnet_flag() {
        assert_eq!(Network::from_testnet_flag(false), Network::Dogecoin);
        assert_eq!(Network::from_testnet_flag(true), Network::DogecoinTestnet);
        assert!(Network::default().is_mainnet());
    }
}
