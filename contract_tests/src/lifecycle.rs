//! Thread lifecycle and deferred reclamation contracts
