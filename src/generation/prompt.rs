use super::{ContentType, ValidatedRequest};
use crate::completion::CompletionRequest;

/// Role description sent as the system message
pub fn system_prompt(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::PostSocial => {
            "Eres un experto en marketing digital y redes sociales. \
             Crea contenido viral, atractivo y que genere engagement. \
             Incluye hashtags relevantes y emojis apropiados."
        }
        ContentType::Email => {
            "Eres un copywriter experto en email marketing. \
             Crea emails persuasivos, profesionales y que generen conversiones. \
             Usa técnicas de copywriting probadas."
        }
        ContentType::Description => {
            "Eres un experto en descripciones de productos y servicios. \
             Crea descripciones atractivas, detalladas y que conviertan. \
             Enfócate en beneficios y características clave."
        }
        ContentType::Title => {
            "Eres un experto en SEO y copywriting. \
             Crea títulos llamativos, optimizados para SEO y que generen clicks. \
             Usa palabras de poder y técnicas de persuasión."
        }
        ContentType::BlogPost => {
            "Eres un blogger experto y escritor profesional. \
             Crea artículos informativos, bien estructurados y que aporten valor. \
             Usa un lenguaje claro y accesible."
        }
    }
}

fn closing_instruction(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::PostSocial => {
            "Crea un post atractivo para redes sociales con hashtags relevantes."
        }
        ContentType::Email => "Escribe un email profesional y persuasivo.",
        ContentType::Description => "Crea una descripción detallada y atractiva.",
        ContentType::Title => "Genera títulos llamativos y optimizados para SEO.",
        ContentType::BlogPost => "Escribe un artículo de blog completo y bien estructurado.",
    }
}

/// User message: topic, tone, length, optional extra instructions, closing line
pub fn user_prompt(request: &ValidatedRequest) -> String {
    let mut prompt = format!(
        "Genera contenido sobre: {}\nTono: {}\nLongitud: {}\n",
        request.topic.trim(),
        request.tone,
        request.length
    );

    if let Some(extra) = request
        .additional_prompt
        .as_deref()
        .map(str::trim)
        .filter(|extra| !extra.is_empty())
    {
        prompt.push_str(&format!("Instrucciones adicionales: {}\n", extra));
    }

    prompt.push_str(closing_instruction(request.content_type));
    prompt
}

pub fn build(request: &ValidatedRequest) -> CompletionRequest {
    CompletionRequest {
        system_prompt: system_prompt(request.content_type).to_string(),
        user_prompt: user_prompt(request),
    }
}
