//! Local Transaction Signer
//!
//! Implements `TransactionSigner` with an in-process secp256k1 key.

use crate::domain::{Address, DynamicFeeTx, RelayError, SignedTransaction};
use crate::ports::outbound::TransactionSigner;
use warp_crypto::Secp256k1KeyPair;

pub struct LocalTxSigner {
    key: Secp256k1KeyPair,
    address: Address,
}

impl LocalTxSigner {
    pub fn new(key: Secp256k1KeyPair) -> Self {
        let address = key.address();
        Self { key, address }
    }
}

impl TransactionSigner for LocalTxSigner {
    fn sender(&self) -> Address {
        self.address
    }

    fn sign(&self, tx: DynamicFeeTx) -> Result<SignedTransaction, RelayError> {
        let signature =
            self.key
                .sign_prehash(&tx.signing_hash())
                .map_err(|e| RelayError::Signing {
                    nonce: tx.nonce,
                    reason: e.to_string(),
                })?;
        Ok(SignedTransaction::new(tx, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeePolicy;

    #[test]
    fn test_signed_tx_recovers_sender() {
        let signer = LocalTxSigner::new(Secp256k1KeyPair::generate());
        let signed = signer
            .sign(DynamicFeeTx::relay(1, 4, FeePolicy::default(), &[1, 2, 3]))
            .unwrap();

        assert_eq!(signed.nonce(), 4);
        assert_eq!(signed.sender().unwrap(), signer.sender());
    }
}
