pub mod oauth_handlers;
