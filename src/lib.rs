//! # Housing Helpdesk Telegram Bot
//!
//! A Telegram assistant for housing and utility questions. Users either browse
//! a menu of prepared answers, fill in a document template, or ask free-form
//! questions answered from a local knowledge base with a hosted language model.

pub mod answer;
pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod dialogue;
pub mod dispatch;
pub mod documents;
pub mod errors;
pub mod knowledge_base;
pub mod localization;
pub mod menu;
pub mod providers;
pub mod session_store;
pub mod telemetry;
pub mod text_splitter;
pub mod webhook;
