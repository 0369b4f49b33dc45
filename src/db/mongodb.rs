use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::{Client, Collection, Database};

use crate::api::AppError;
use crate::config::Configuracion;
use crate::db::models::{Comercio, Publicidad, Resenia, Reserva, RolUsuario, TipoComercio, Usuario};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone)]
pub struct MongoRepo {
    pub client: Client,
    pub database: Database,
}

impl MongoRepo {
    pub async fn init(config: &Configuracion) -> Result<MongoRepo> {
        let client = Client::with_uri_str(&config.mongodb_uri)
            .await
            .map_err(|e| AppError::Internal(format!("Error conectando a MongoDB: {}", e)))?;

        let database = client.database(&config.mongodb_database);

        // Test connection
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::Internal(format!("Error validando conexión MongoDB: {}", e)))?;

        tracing::info!("Conexión a MongoDB establecida exitosamente");

        Ok(MongoRepo { client, database })
    }

    pub fn usuarios(&self) -> Collection<Usuario> {
        self.database.collection("usuarios")
    }

    pub fn roles_usuario(&self) -> Collection<RolUsuario> {
        self.database.collection("roles_usuario")
    }

    pub fn tipos_comercio(&self) -> Collection<TipoComercio> {
        self.database.collection("tipos_comercio")
    }

    pub fn comercios(&self) -> Collection<Comercio> {
        self.database.collection("comercios")
    }

    pub fn reservas(&self) -> Collection<Reserva> {
        self.database.collection("reservas")
    }

    pub fn resenias(&self) -> Collection<Resenia> {
        self.database.collection("resenias")
    }

    pub fn publicidades(&self) -> Collection<Publicidad> {
        self.database.collection("publicidades")
    }

    // Método para crear índices si es necesario
    pub async fn create_indexes(&self) -> Result<()> {
        use mongodb::{options::IndexOptions, IndexModel};

        let comercio_indexes = vec![
            // el CUIT es único entre comercios activos e históricos
            IndexModel::builder()
                .keys(doc! { "cuit": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            IndexModel::builder().keys(doc! { "id_usuario": 1 }).build(),
            IndexModel::builder().keys(doc! { "nombre": 1 }).build(),
        ];

        self.comercios()
            .create_indexes(comercio_indexes)
            .await
            .map_err(|e| AppError::Internal(format!("Error creando índices comercios: {}", e)))?;

        let usuario_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "uid_externo": 1 })
                .options(IndexOptions::builder().unique(true).sparse(true).build())
                .build(),
            IndexModel::builder().keys(doc! { "correo": 1 }).build(),
        ];

        self.usuarios()
            .create_indexes(usuario_indexes)
            .await
            .map_err(|e| AppError::Internal(format!("Error creando índices usuarios: {}", e)))?;

        let reserva_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "id_usuario": 1, "id_comercio": 1, "fecha_reserva": 1 })
                .build(),
            IndexModel::builder().keys(doc! { "id_comercio": 1 }).build(),
        ];

        self.reservas()
            .create_indexes(reserva_indexes)
            .await
            .map_err(|e| AppError::Internal(format!("Error creando índices reservas: {}", e)))?;

        let resenia_indexes = vec![IndexModel::builder()
            .keys(doc! { "id_usuario": 1, "id_comercio": 1 })
            .build()];

        self.resenias()
            .create_indexes(resenia_indexes)
            .await
            .map_err(|e| AppError::Internal(format!("Error creando índices reseñas: {}", e)))?;

        let publicidad_indexes = vec![IndexModel::builder()
            .keys(doc! { "id_comercio": 1 })
            .build()];

        self.publicidades()
            .create_indexes(publicidad_indexes)
            .await
            .map_err(|e| AppError::Internal(format!("Error creando índices publicidades: {}", e)))?;

        tracing::info!("Índices MongoDB creados exitosamente");
        Ok(())
    }

    /// Carga los catálogos de roles y tipos de comercio si están vacíos
    pub async fn seed_catalogos(&self) -> Result<()> {
        let roles = self.roles_usuario();
        if roles.count_documents(doc! {}).await? == 0 {
            let ahora = Self::current_timestamp();
            roles
                .insert_many(vec![
                    RolUsuario {
                        id: None,
                        descripcion: "usuario".to_string(),
                        activo: true,
                        fecha_creacion: ahora,
                    },
                    RolUsuario {
                        id: None,
                        descripcion: "administrador".to_string(),
                        activo: true,
                        fecha_creacion: ahora,
                    },
                ])
                .await?;
            tracing::info!("Catálogo de roles de usuario inicializado");
        }

        let tipos = self.tipos_comercio();
        if tipos.count_documents(doc! {}).await? == 0 {
            let ahora = Self::current_timestamp();
            tipos
                .insert_many(vec![
                    TipoComercio {
                        id: None,
                        descripcion: "bar".to_string(),
                        activo: true,
                        fecha_creacion: ahora,
                    },
                    TipoComercio {
                        id: None,
                        descripcion: "boliche".to_string(),
                        activo: true,
                        fecha_creacion: ahora,
                    },
                    TipoComercio {
                        id: None,
                        descripcion: "restaurante".to_string(),
                        activo: true,
                        fecha_creacion: ahora,
                    },
                ])
                .await?;
            tracing::info!("Catálogo de tipos de comercio inicializado");
        }

        Ok(())
    }

    /// Devuelve el rol por defecto para usuarios nuevos
    pub async fn rol_por_defecto(&self) -> Result<RolUsuario> {
        self.roles_usuario()
            .find_one(doc! { "descripcion": "usuario" })
            .await?
            .ok_or_else(|| AppError::Internal("Catálogo de roles sin inicializar".to_string()))
    }

    /// Elimina un comercio y todos sus dependientes.
    ///
    /// Orden dependientes-primero: si un paso intermedio falla nunca quedan
    /// reservas, reseñas o publicidades huérfanas apuntando a un comercio
    /// ya borrado.
    ///
    /// Devuelve `false` si el comercio no existía.
    pub async fn eliminar_comercio_en_cascada(&self, id_comercio: ObjectId) -> Result<bool> {
        self.reservas()
            .delete_many(doc! { "id_comercio": id_comercio })
            .await
            .map_err(|e| AppError::database("cascada_reservas", e))?;

        self.resenias()
            .delete_many(doc! { "id_comercio": id_comercio })
            .await
            .map_err(|e| AppError::database("cascada_resenias", e))?;

        self.publicidades()
            .delete_many(doc! { "id_comercio": id_comercio })
            .await
            .map_err(|e| AppError::database("cascada_publicidades", e))?;

        let result = self
            .comercios()
            .delete_one(doc! { "_id": id_comercio })
            .await
            .map_err(|e| AppError::database("eliminar_comercio", e))?;

        Ok(result.deleted_count > 0)
    }

    /// Elimina un usuario, sus comercios (con la cascada de cada uno) y sus
    /// propias reservas y reseñas. Devuelve `false` si no existía.
    pub async fn eliminar_usuario_en_cascada(&self, id_usuario: ObjectId) -> Result<bool> {
        let mut cursor = self
            .comercios()
            .find(doc! { "id_usuario": id_usuario })
            .await
            .map_err(|e| AppError::database("comercios_del_usuario", e))?;

        let mut ids_comercios = Vec::new();
        while cursor
            .advance()
            .await
            .map_err(|e| AppError::database("comercios_del_usuario", e))?
        {
            let comercio = cursor
                .deserialize_current()
                .map_err(|e| AppError::Internal(format!("Error deserializando comercio: {}", e)))?;
            if let Some(id) = comercio.id {
                ids_comercios.push(id);
            }
        }

        for id in ids_comercios {
            self.eliminar_comercio_en_cascada(id).await?;
        }

        self.reservas()
            .delete_many(doc! { "id_usuario": id_usuario })
            .await
            .map_err(|e| AppError::database("cascada_reservas_usuario", e))?;

        self.resenias()
            .delete_many(doc! { "id_usuario": id_usuario })
            .await
            .map_err(|e| AppError::database("cascada_resenias_usuario", e))?;

        let result = self
            .usuarios()
            .delete_one(doc! { "_id": id_usuario })
            .await
            .map_err(|e| AppError::database("eliminar_usuario", e))?;

        Ok(result.deleted_count > 0)
    }

    // Función auxiliar para obtener timestamp actual
    pub fn current_timestamp() -> i64 {
        chrono::Utc::now().timestamp()
    }
}
