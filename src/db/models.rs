use mongodb::bson::oid::ObjectId;
use mongodb::bson::Binary;
use serde::{Deserialize, Serialize};

use crate::domain::EstadoAprobacion;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Usuario {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub nombre_usuario: String,
    pub correo: String,
    pub telefono: Option<String>,
    /// false = deshabilitado (baja lógica)
    pub activo: bool,
    pub motivo_rechazo: Option<String>,
    /// UID en el proveedor de identidad externo
    pub uid_externo: Option<String>,
    pub id_rol: ObjectId,
    pub fecha_creacion: i64, // timestamp unix
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RolUsuario {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub descripcion: String,
    pub activo: bool,
    pub fecha_creacion: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TipoComercio {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub descripcion: String,
    pub activo: bool,
    pub fecha_creacion: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comercio {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub nombre: String,
    /// Identificador tributario, único entre comercios activos e históricos
    pub cuit: String,
    pub direccion: String,
    pub correo: String,
    pub telefono: String,
    pub capacidad: i32,
    pub mesas: i32,
    pub genero_musical: Option<String>,
    /// "HH:MM"
    pub hora_ingreso: Option<String>,
    pub hora_cierre: Option<String>,
    pub foto: Option<Binary>,
    /// false = pendiente de aprobación o rechazado
    pub activo: bool,
    /// Solo tiene sentido cuando activo = false
    pub motivo_rechazo: Option<String>,
    pub id_usuario: ObjectId,
    pub id_tipo_comercio: ObjectId,
    pub fecha_creacion: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Reserva {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub id_usuario: ObjectId,
    pub id_comercio: ObjectId,
    /// "YYYY-MM-DD"; los conflictos se comparan a granularidad de día
    pub fecha_reserva: String,
    pub comensales: i32,
    pub tolerancia_minutos: i64,
    #[serde(flatten)]
    pub estado: EstadoAprobacion,
    pub fecha_creacion: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Resenia {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub id_usuario: ObjectId,
    pub id_comercio: ObjectId,
    /// Entero 1..=5
    pub puntaje: i32,
    pub comentario: String,
    #[serde(flatten)]
    pub estado: EstadoAprobacion,
    pub fecha_creacion: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Publicidad {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub id_comercio: ObjectId,
    pub descripcion: String,
    pub visualizaciones: i64,
    /// Duración de exhibición en segundos
    pub tiempo_segundos: i64,
    pub imagen: Option<Binary>,
    #[serde(flatten)]
    pub estado: EstadoAprobacion,
    /// Monótono: false -> true, nunca se revierte
    pub pago: bool,
    pub fecha_creacion: i64,
}
