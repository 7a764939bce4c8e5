pub mod branding;
pub mod compose;
pub mod config;
pub mod controls;
pub mod layers;
pub mod materials;
pub mod mesh;
pub mod panels;
pub mod resources;
pub mod schema;
pub mod session;
pub mod text;
