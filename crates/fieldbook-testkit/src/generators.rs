//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use fieldbook_core::{
    DocumentId, DocumentType, FamilyMemberId, Principal, ShareIdentity, ShareScope, UserId,
};

/// Generate a random UserId.
pub fn user_id() -> impl Strategy<Value = UserId> {
    any::<[u8; 16]>().prop_map(UserId::from_bytes)
}

/// Generate a random FamilyMemberId.
pub fn family_member_id() -> impl Strategy<Value = FamilyMemberId> {
    any::<[u8; 16]>().prop_map(FamilyMemberId::from_bytes)
}

/// Generate a random DocumentId.
pub fn document_id() -> impl Strategy<Value = DocumentId> {
    any::<[u8; 16]>().prop_map(DocumentId::from_bytes)
}

/// Generate a DocumentType.
pub fn document_type() -> impl Strategy<Value = DocumentType> {
    prop_oneof![
        Just(DocumentType::MatchReport),
        Just(DocumentType::PersonalScout),
    ]
}

/// Generate a ShareScope; `one` scopes get a random document.
pub fn scope() -> impl Strategy<Value = ShareScope> {
    prop_oneof![
        document_id().prop_map(ShareScope::One),
        Just(ShareScope::All),
    ]
}

/// Generate a share recipient.
pub fn principal() -> impl Strategy<Value = Principal> {
    prop_oneof![
        user_id().prop_map(Principal::User),
        family_member_id().prop_map(Principal::Family),
    ]
}

/// Generate a full share identity.
pub fn share_identity() -> impl Strategy<Value = ShareIdentity> {
    (user_id(), document_type(), scope(), principal()).prop_map(
        |(owner_id, document_type, scope, shared_with)| ShareIdentity {
            owner_id,
            document_type,
            scope,
            shared_with,
        },
    )
}

/// Generate a structurally valid email address, in mixed case.
pub fn email() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9._+-]{0,15}@[a-z][a-z0-9-]{0,10}\\.(com|org|co\\.uk)"
        .prop_map(String::from)
}

/// Generate report fields: string, number or bool values.
pub fn report_fields() -> impl Strategy<Value = Map<String, Value>> {
    let value = prop_oneof![
        "[ -~]{0,64}".prop_map(Value::String),
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::Bool),
    ];
    prop::collection::btree_map("[a-z][a-zA-Z]{0,15}", value, 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Generate a password.
pub fn password() -> impl Strategy<Value = String> {
    "[ -~]{1,32}".prop_map(String::from)
}
