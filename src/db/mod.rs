// src/db/mod.rs
pub mod models;
pub mod mongodb;

pub use models::{Comercio, Publicidad, Resenia, Reserva, RolUsuario, TipoComercio, Usuario};
pub use mongodb::MongoRepo;
