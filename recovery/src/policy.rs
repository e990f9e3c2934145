//! Who may open which kind of request.
//!
//! | request type        | minimum role | exception                                  |
//! |---------------------|--------------|--------------------------------------------|
//! | key_recovery        | offspring    |                                            |
//! | account_restoration | offspring    |                                            |
//! | emergency_liquidity | adult        | offspring with `elevated_approval = true`  |
//!
//! `private` accounts have no federation, so guardian consensus can never
//! succeed for them.

use crate::RecoveryError;
use keyward_types::{AccountId, AccountRole, RecoveryMethod, RequestType};

pub fn minimum_role(request_type: RequestType) -> AccountRole {
    match request_type {
        RequestType::KeyRecovery | RequestType::AccountRestoration => AccountRole::Offspring,
        RequestType::EmergencyLiquidity => AccountRole::Adult,
    }
}

/// Check the requester against the role policy table.
pub fn check_authority(
    account: &AccountId,
    role: AccountRole,
    request_type: RequestType,
    method: RecoveryMethod,
    elevated_approval: bool,
) -> Result<(), RecoveryError> {
    if !method.uses_guardians() {
        return Err(RecoveryError::InsufficientAuthority(format!(
            "{method} recovery is handled outside guardian consensus"
        )));
    }
    if !role.is_federated() {
        return Err(RecoveryError::NoGuardiansConfigured(account.to_string()));
    }

    let minimum = minimum_role(request_type);
    if role.at_least(minimum) {
        return Ok(());
    }
    if request_type == RequestType::EmergencyLiquidity
        && role == AccountRole::Offspring
        && elevated_approval
    {
        return Ok(());
    }
    Err(RecoveryError::InsufficientAuthority(format!(
        "{role} accounts may not request {request_type} (minimum role {minimum})"
    )))
}
