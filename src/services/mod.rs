/// Countdown repaint ticker.
pub mod clock_refresh;
/// Optimistic operator command pipeline.
pub mod command_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Race state poll loop.
pub mod poller;
/// Clock mode and race selection.
pub mod preferences_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Full view projection.
pub mod view_service;

#[cfg(test)]
mod test_support;
