// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request validation: addresses, cardinalities, bounded parameters.

use crate::dispatch::DispatchError;

/// Solana addresses are base58, 32..44 characters.
pub fn validate_address(field: &str, addr: &str) -> Result<(), DispatchError> {
    if addr.len() < 32 || addr.len() > 44 {
        return Err(DispatchError::InvalidInput(format!(
            "{field} must be 32..44 characters, got {}",
            addr.len()
        )));
    }
    if bs58::decode(addr).into_vec().is_err() {
        return Err(DispatchError::InvalidInput(format!("{field} is not valid base58: {addr}")));
    }
    Ok(())
}

/// A wallet list with a minimum cardinality, every entry a valid address.
pub fn validate_addresses(
    field: &str,
    addrs: &[String],
    min: usize,
) -> Result<(), DispatchError> {
    if addrs.len() < min {
        return Err(DispatchError::InvalidInput(format!(
            "{field} needs at least {min} addresses, got {}",
            addrs.len()
        )));
    }
    for addr in addrs {
        validate_address(field, addr)?;
    }
    Ok(())
}

/// Holder-profiles topN is bounded 1..=50.
pub fn validate_top_n(top_n: u32) -> Result<(), DispatchError> {
    if !(1..=50).contains(&top_n) {
        return Err(DispatchError::InvalidInput(format!("topN must be 1..50, got {top_n}")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
