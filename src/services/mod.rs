//! Service layer modules for external integrations.
//!
//! Contains the Redis cache, the Supabase Auth client and the outbound
//! notification channels (email, calendar, Slack).

pub mod cache;
pub mod calendar_invite;
pub mod email;
pub mod google_calendar;
pub mod slack;
pub mod supabase;
pub mod two_factor;

pub use cache::RedisCache;
pub use email::Mailer;
pub use google_calendar::CalendarClient;
pub use slack::SlackNotifier;
pub use supabase::AuthProvider;
