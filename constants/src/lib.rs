/// Shared configuration for the display controller and its browser binding
pub mod attributes;
pub mod endpoint;
pub mod origin;
pub mod protocol;
