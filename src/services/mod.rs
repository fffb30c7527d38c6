//! External request/response collaborators: weather and chat intent.
//!
//! Both are synchronous traits so the controller loop can stay
//! single-threaded. The HTTP implementations (behind the `network`
//! feature) run their async `reqwest` clients on a private current-thread
//! runtime.

pub mod intent;
pub mod weather;

pub use intent::{
    parse_reply, ChatError, ConversationSource, Intent, IntentReply, OfflineConversation,
    TodoDraft,
};
pub use weather::{
    condition_from_code, CachedWeather, Observation, UnavailableWeather, WeatherCache,
    WeatherError, WeatherService, WeatherSource,
};

#[cfg(feature = "network")]
pub use intent::{BlockingChatClient, ChatClient, ChatEndpoint};
#[cfg(feature = "network")]
pub use weather::{BlockingOpenWeatherClient, OpenWeatherClient};
