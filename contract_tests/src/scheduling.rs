//! Strict-priority scheduling contracts
