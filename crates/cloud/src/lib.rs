//! Google Cloud integrations: Secret Manager and Firebase Admin.
//!
//! Both are optional at runtime. Secret loading reports a typed status per
//! secret and never aborts; Firebase initialisation yields `None` when the
//! service account is absent or unusable.

pub mod firebase;
pub mod secrets;
