//! GameStream PIN pairing protocol (sans-IO)

pub mod messages;
pub mod pin;
pub mod response;
pub mod session;
pub mod state;


pub use messages::{
    PAIR_PATH, PairingStep, QueryParams, SERVER_INFO_PATH, UNPAIR_PATH, base_params, params,
    phrases,
};
pub use pin::{InvalidPin, PIN_LENGTH, Pin, generate_pin};
pub use response::{PairingResponse, names};
pub use session::{CHALLENGE_RESPONSE_MIN, PairingSession};
pub use state::PairState;
