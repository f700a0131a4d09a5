//! Tronbyt Pairing - Device claim protocol
//!
//! Implements the device pairing/claim flow for multi-tenant mode:
//!
//! 1. Firmware asks for a pairing token during device setup
//! 2. The token is shown on the display and entered in the web dashboard
//! 3. The server binds the device to the user permanently
//!
//! Tokens are single-use and time-limited. A device, once claimed, stays
//! with its owner: re-pairing by the same account is idempotent, claiming
//! by a different account is rejected.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tronbyt_pairing::PairingManager;
//! use tronbyt_store::MemoryStore;
//!
//! async fn example() {
//!     let manager = PairingManager::new(Arc::new(MemoryStore::new()));
//!
//!     // Firmware side
//!     let token = manager.issue_token("a1b2c3d4").await.unwrap();
//!
//!     // Dashboard side
//!     let result = manager.claim_device("user-uuid", &token.token).await;
//!     assert!(result.success);
//! }
//! ```

pub mod apps;
pub mod claim;
pub mod device;
pub mod token;

pub use apps::InstallationManager;
pub use claim::{ClaimResult, PairingManager};
pub use device::{is_valid_device_id, sanitize_device_patch, Device, DeviceId};
pub use token::{generate_pairing_token, PairingToken, PendingDevice};
