mod button;
mod pins;

pub use button::{
    ButtonBank, ButtonState, ButtonTiming, DEBOUNCE_INTERVAL_MS, Debouncer, HOLD_TIME_MS,
    STUCK_TIMEOUT_MS,
};
pub use pins::ButtonPins;
