use serde::Serialize;

/// Cuerpo de un correo en sus dos variantes (texto plano y HTML).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailContent {
    pub text: String,
    pub html: String,
}
