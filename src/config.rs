use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub twilio: Option<TwilioConfig>,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub http: HttpClientConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Cloud API 访问令牌
    pub access_token: String,
    pub phone_number_id: String,
    /// webhook 订阅校验用的共享密钥
    pub verify_token: String,
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// 为空时不调用 AI，直接走关键词回复
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_anthropic_model(),
            max_tokens: default_anthropic_max_tokens(),
            base_url: default_anthropic_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 外部 HTTP 调用（AI、WhatsApp、Twilio）的超时时间
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 10 位本地号码补全时使用的国家码
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default)]
    pub admins: Vec<AdminPrincipalConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            admins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminPrincipalConfig {
    pub email: String,
    /// bcrypt 哈希
    pub password_hash: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v18.0".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_anthropic_max_tokens() -> u32 {
    1024
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_country_code() -> String {
    "52".to_string()
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 3000u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                    },
                    whatsapp: WhatsAppConfig {
                        access_token: get_env("WHATSAPP_TOKEN").unwrap_or_default(),
                        phone_number_id: get_env("WHATSAPP_PHONE_NUMBER_ID").unwrap_or_default(),
                        verify_token: get_env("VERIFY_TOKEN")
                            .unwrap_or_else(|| "your_verify_token".to_string()),
                        graph_base_url: default_graph_base_url(),
                        api_version: default_graph_api_version(),
                    },
                    anthropic: AnthropicConfig::default(),
                    twilio: None,
                    smtp: None,
                    http: HttpClientConfig::default(),
                    auth: AuthConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Cannot read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(config_str).map_err(|e| format!("Invalid config file: {e}").into())
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("WHATSAPP_TOKEN") {
            self.whatsapp.access_token = v;
        }
        if let Ok(v) = env::var("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Ok(v) = env::var("VERIFY_TOKEN") {
            self.whatsapp.verify_token = v;
        }

        // Anthropic
        if let Ok(v) = env::var("ANTHROPIC_API_KEY")
            && !v.trim().is_empty()
        {
            self.anthropic.api_key = Some(v);
        }
        if let Ok(v) = env::var("ANTHROPIC_MODEL") {
            self.anthropic.model = v;
        }

        // Twilio：三项齐全才启用短信通道
        if let (Ok(sid), Ok(token), Ok(from)) = (
            env::var("TWILIO_ACCOUNT_SID"),
            env::var("TWILIO_AUTH_TOKEN"),
            env::var("TWILIO_FROM_PHONE"),
        ) {
            self.twilio = Some(TwilioConfig {
                account_sid: sid,
                auth_token: token,
                from_phone: from,
            });
        }

        // SMTP
        if let (Ok(host), Ok(username), Ok(password), Ok(from)) = (
            env::var("SMTP_HOST"),
            env::var("SMTP_USERNAME"),
            env::var("SMTP_PASSWORD"),
            env::var("SMTP_FROM"),
        ) {
            self.smtp = Some(SmtpConfig {
                host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_smtp_port),
                username,
                password,
                from_address: from,
            });
        }

        if let Ok(v) = env::var("HTTP_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            self.http.timeout_secs = n;
        }
        if let Ok(v) = env::var("COUNTRY_CODE") {
            self.auth.country_code = v;
        }

        // 单管理员的环境变量写法，会追加到 [[auth.admins]] 之后
        if let (Ok(email), Ok(password_hash)) =
            (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD_HASH"))
        {
            let phone_number = env::var("ADMIN_PHONE").ok();
            match self
                .auth
                .admins
                .iter_mut()
                .find(|a| a.email.eq_ignore_ascii_case(&email))
            {
                Some(existing) => {
                    existing.password_hash = password_hash;
                    if phone_number.is_some() {
                        existing.phone_number = phone_number;
                    }
                }
                None => self.auth.admins.push(AdminPrincipalConfig {
                    email,
                    password_hash,
                    phone_number,
                    name: None,
                }),
            }
        }
    }
}
