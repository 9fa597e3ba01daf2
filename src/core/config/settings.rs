use super::parsing::{
    env_optional, env_or_default, is_supported_spreadsheet_extension, parse_bool,
    parse_cors_origins, parse_environment, parse_string_list, parse_u16, parse_u32, parse_u64,
    parse_u8,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ImportSettings,
    RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("REGISTRO_HOST", "0.0.0.0");
        let port = env_or_default("REGISTRO_PORT", "8000");

        let environment = parse_environment(
            env_optional("REGISTRO_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config =
            env_optional("REGISTRO_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Registro API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "720"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");
        let login_rate_limit =
            parse_u64("LOGIN_RATE_LIMIT", env_or_default("LOGIN_RATE_LIMIT", "10"))?;
        let login_rate_window_seconds = parse_u64(
            "LOGIN_RATE_WINDOW_SECONDS",
            env_or_default("LOGIN_RATE_WINDOW_SECONDS", "60"),
        )?;

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "registro");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "registro_db");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DATABASE_MAX_CONNECTIONS", env_or_default("DATABASE_MAX_CONNECTIONS", "20"))?;
        let acquire_timeout_seconds = parse_u64(
            "DATABASE_ACQUIRE_TIMEOUT_SECONDS",
            env_or_default("DATABASE_ACQUIRE_TIMEOUT_SECONDS", "30"),
        )?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let first_superuser_username = env_or_default("FIRST_SUPERUSER_USERNAME", "admin");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let import_defaults = ImportSettings::default();
        let min_age = parse_u8(
            "IMPORT_MIN_AGE",
            env_or_default("IMPORT_MIN_AGE", &import_defaults.min_age.to_string()),
        )?;
        let max_age = parse_u8(
            "IMPORT_MAX_AGE",
            env_or_default("IMPORT_MAX_AGE", &import_defaults.max_age.to_string()),
        )?;
        let template_min_age = parse_u8(
            "TEMPLATE_MIN_AGE",
            env_or_default("TEMPLATE_MIN_AGE", &import_defaults.template_min_age.to_string()),
        )?;
        let template_max_age = parse_u8(
            "TEMPLATE_MAX_AGE",
            env_or_default("TEMPLATE_MAX_AGE", &import_defaults.template_max_age.to_string()),
        )?;
        let max_upload_size_mb = parse_u64(
            "IMPORT_MAX_UPLOAD_SIZE_MB",
            env_or_default(
                "IMPORT_MAX_UPLOAD_SIZE_MB",
                &import_defaults.max_upload_size_mb.to_string(),
            ),
        )?;
        let allowed_extensions =
            parse_string_list(env_optional("IMPORT_ALLOWED_EXTENSIONS"), &["xlsx", "xls", "ods"]);

        let log_level = env_or_default("REGISTRO_LOG_LEVEL", "info");
        let json = env_optional("REGISTRO_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings { host: ServerHost::parse(host)?, port: ServerPort::parse(port)? },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings {
                secret_key,
                access_token_expire_minutes,
                algorithm,
                login_rate_limit,
                login_rate_window_seconds,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
                acquire_timeout_seconds,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            admin: AdminSettings { first_superuser_username, first_superuser_password },
            import: ImportSettings {
                min_age,
                max_age,
                template_min_age,
                template_max_age,
                max_upload_size_mb,
                allowed_extensions,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &super::types::ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn import(&self) -> &ImportSettings {
        &self.import
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.import.min_age > self.import.max_age {
            return Err(ConfigError::InvalidValue {
                field: "IMPORT_MIN_AGE",
                value: format!("{} > {}", self.import.min_age, self.import.max_age),
            });
        }

        if self.import.template_min_age > self.import.template_max_age {
            return Err(ConfigError::InvalidValue {
                field: "TEMPLATE_MIN_AGE",
                value: format!("{} > {}", self.import.template_min_age, self.import.template_max_age),
            });
        }

        if self.import.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "IMPORT_ALLOWED_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.import.allowed_extensions {
            if !is_supported_spreadsheet_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "IMPORT_ALLOWED_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }

        Ok(())
    }
}
