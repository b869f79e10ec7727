use crate::external::CompletionClient;
use std::sync::Arc;

/// 关键词分组，顺序即优先级，先命中者胜
pub struct KeywordGroup {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub response: &'static str,
}

pub const KEYWORD_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        name: "greeting",
        keywords: &["hola", "buenos días", "buenos dias", "buenas tardes", "buenas noches", "saludos"],
        response: "¡Hola! 👋 Gracias por escribirnos. ¿En qué podemos ayudarte hoy? Puedes preguntarnos por nuestros servicios, horarios, ubicación o cómo registrarte.",
    },
    KeywordGroup {
        name: "offerings",
        keywords: &["servicio", "producto", "precio", "costo", "ofrecen", "catálogo", "catalogo"],
        response: "Ofrecemos asesoría personalizada, soporte técnico y planes a la medida de tu negocio. Escríbenos qué necesitas y te enviamos precios y detalles.",
    },
    KeywordGroup {
        name: "hours",
        keywords: &["horario", "hora", "abierto", "abren", "cierran"],
        response: "Nuestro horario de atención es de lunes a viernes de 9:00 a 18:00 y sábados de 9:00 a 14:00.",
    },
    KeywordGroup {
        name: "location",
        keywords: &["ubicación", "ubicacion", "dirección", "direccion", "dónde", "donde"],
        response: "Estamos ubicados en el centro de la ciudad. Escríbenos y te compartimos la ubicación exacta en el mapa.",
    },
    KeywordGroup {
        name: "contact",
        keywords: &["contacto", "teléfono", "telefono", "correo", "email", "llamar"],
        response: "Puedes contactarnos por este mismo chat de WhatsApp o escribirnos a nuestro correo. Un asesor te atenderá en horario laboral.",
    },
    KeywordGroup {
        name: "registration",
        keywords: &["registro", "registrar", "inscribir", "inscripción", "inscripcion", "cuenta"],
        response: "Para registrarte solo necesitamos tu nombre completo y correo electrónico. Envíanoslos por aquí y te damos de alta.",
    },
];

/// 没有任何分组命中时的回复，回显原文
pub fn default_response(text: &str) -> String {
    format!(
        "Gracias por tu mensaje: \"{text}\". Un asesor te responderá pronto. También puedes preguntarnos por servicios, horarios, ubicación, contacto o registro."
    )
}

/// 纯关键词匹配：大小写不敏感的子串匹配，按固定顺序取第一个命中的分组
pub fn rule_based_reply(text: &str) -> String {
    let lowered = text.to_lowercase();
    KEYWORD_GROUPS
        .iter()
        .find(|group| group.keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|group| group.response.to_string())
        .unwrap_or_else(|| default_response(text))
}

/// 回复生成：优先 AI，失败时退回关键词匹配，永不返回错误
#[derive(Clone, Default)]
pub struct ReplyResolver {
    ai: Option<Arc<dyn CompletionClient>>,
}

impl ReplyResolver {
    pub fn new(ai: Option<Arc<dyn CompletionClient>>) -> Self {
        Self { ai }
    }

    pub fn rule_based() -> Self {
        Self { ai: None }
    }

    pub async fn resolve(&self, text: &str) -> String {
        if let Some(ai) = &self.ai {
            match ai.complete(text).await {
                Ok(reply) => return reply,
                Err(e) => log::warn!("AI completion failed, using keyword reply: {e}"),
            }
        }
        rule_based_reply(text)
    }
}
