//! Bounded-attempt remediation for the technical-support loop.
//!
//! Each attempt asks the generative backend for a fix. When the backend errors,
//! times out or is missing, a fixed local text is used instead: a generic
//! checklist for attempt 1 and, for attempts 2..=5, a ladder of three canned
//! solutions indexed by `(attempt - 2) % 3`.

use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{BackendError, GenerativeBackend};
use crate::session::MAX_AI_ATTEMPTS;

pub const FIRST_ATTEMPT_FALLBACK: &str = "Vamos diagnosticar seu problema passo a passo:\n\n\
1️⃣ Verifique as conexões - Confirme se todos os cabos estão bem conectados\n\
2️⃣ Reinicie o modem - Desligue por 30 segundos e ligue novamente\n\
3️⃣ Teste a velocidade - Use speedtest.net para verificar";

pub const FALLBACK_LADDER: [&str; 3] = [
    "🔧 *Verificação de DNS*\n\n\
1️⃣ Altere o DNS para 177.39.208.2 e 177.39.208.3\n\
2️⃣ Limpe o cache DNS: `ipconfig /flushdns`\n\
3️⃣ Teste novamente",
    "🔧 *Verificação de Portas*\n\n\
1️⃣ Teste diferentes portas Ethernet\n\
2️⃣ Verifique se o cabo não está danificado\n\
3️⃣ Teste com outro dispositivo",
    "🔧 *Verificação de Sinal*\n\n\
1️⃣ Verifique atenuação da linha\n\
2️⃣ Confirme se não há interferências\n\
3️⃣ Teste isoladamente sem outros equipamentos",
];

pub const FREE_ASSISTANT_FALLBACK: &str = "🤖 Desculpe, não consegui processar sua pergunta no momento. \
Tente novamente ou digite *MENU* para voltar ao menu principal.";

const RESOLUTION_QUESTION: &str = "*Isso resolveu seu problema?*\n\
- Digite *SIM* se resolveu\n\
- Digite *NÃO* se não resolveu";

/// Ladder index for a retry attempt (2..=5).
pub fn ladder_index(attempt: u32) -> usize {
    (attempt.saturating_sub(2) as usize) % FALLBACK_LADDER.len()
}

/// Local remediation body for `attempt`, used when the backend is degraded.
pub fn fallback_for(attempt: u32) -> &'static str {
    if attempt <= 1 {
        FIRST_ATTEMPT_FALLBACK
    } else {
        FALLBACK_LADDER[ladder_index(attempt)]
    }
}

/// Prompt for a diagnostic attempt.
pub fn diagnostic_prompt(attempt: u32, name: &str, problem: &str) -> String {
    if attempt <= 1 {
        format!(
            "Você é um técnico especializado em internet, modem e instalações da QI TELECOM.\n\
Analise o problema relatado pelo cliente e forneça uma solução técnica detalhada e prática.\n\
O nome do cliente é: {name}\n\
PROBLEMA: {problem}\n\n\
Forneça:\n\
1. Diagnóstico provável\n\
2. Solução passo a passo\n\
3. Se não funcionar, próximos passos\n\n\
Seja técnico mas didático, lembrando que você está se relacionando com pessoas leigas no assunto. \
Não repita o problema ou o nome do cliente na resposta."
        )
    } else {
        format!(
            "Esta é a tentativa {attempt}/{MAX_AI_ATTEMPTS} de resolver este problema técnico.\n\
Problema anterior: {problem}\n\n\
Forneça uma solução DIFERENTE e mais avançada. Seja mais específico e didático para uma pessoa leiga. \
Tente ser direto ao ponto, sem muita escrita."
        )
    }
}

/// Prompt wrapping a free-form question.
pub fn free_form_prompt(question: &str) -> String {
    format!(
        "Responda de forma útil e amigável em português:\n\n\
Pergunta: {question}\n\n\
Seja informativo, claro e conciso (máximo 250 palavras)."
    )
}

/// Rendered remediation reply plus where its body came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub attempt: u32,
    pub text: String,
    pub used_fallback: bool,
}

/// Calls the generative backend with a per-call timeout and substitutes the
/// local fallbacks on any failure. Never returns an error.
#[derive(Clone)]
pub struct Remediator {
    backend: Arc<dyn GenerativeBackend>,
    timeout: Duration,
}

impl Remediator {
    pub fn new(backend: Arc<dyn GenerativeBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Produces the reply for one diagnostic attempt, clamped to `1..=MAX_AI_ATTEMPTS`.
    pub async fn diagnose(&self, attempt: u32, name: &str, problem: &str) -> Remediation {
        let attempt = attempt.clamp(1, MAX_AI_ATTEMPTS);
        let prompt = diagnostic_prompt(attempt, name, problem);
        let (body, used_fallback) = match self.generate(&prompt).await {
            Ok(text) => (text, false),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "generative backend unavailable, using fallback");
                (fallback_for(attempt).to_string(), true)
            }
        };
        Remediation {
            attempt,
            text: render_attempt(attempt, &body),
            used_fallback,
        }
    }

    /// Answers a free-form question, or returns the static apology on failure.
    pub async fn answer(&self, question: &str) -> String {
        match self.generate(&free_form_prompt(question)).await {
            Ok(text) => format!(
                "🤖 {text}\n\n---\n*Digite *MENU* para voltar ao menu principal*"
            ),
            Err(err) => {
                tracing::warn!(error = %err, "free-form answer unavailable, using fallback");
                FREE_ASSISTANT_FALLBACK.to_string()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let text = tokio::time::timeout(self.timeout, self.backend.generate(prompt))
            .await
            .map_err(|_| {
                BackendError::timeout(format!(
                    "Backend did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })??;
        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::empty_response());
        }
        Ok(text.to_string())
    }
}

fn render_attempt(attempt: u32, body: &str) -> String {
    let title = if attempt <= 1 {
        "Análise Técnica"
    } else {
        "Nova Análise Técnica"
    };
    format!(
        "🔧 *{title} - Tentativa {attempt}/{MAX_AI_ATTEMPTS}*\n\n{body}\n\n---\n{RESOLUTION_QUESTION}"
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::collaborators::{BackendResult, UnavailableBackend};

    struct Scripted {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerativeBackend for Scripted {
        async fn generate(&self, prompt: &str) -> BackendResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.clone())
        }
    }

    struct Stalled;

    #[async_trait]
    impl GenerativeBackend for Stalled {
        async fn generate(&self, _prompt: &str) -> BackendResult<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".to_string())
        }
    }

    fn degraded() -> Remediator {
        Remediator::new(Arc::new(UnavailableBackend), Duration::from_secs(5))
    }

    #[test]
    fn ladder_cycles_through_three_items() {
        assert_eq!(ladder_index(2), 0);
        assert_eq!(ladder_index(3), 1);
        assert_eq!(ladder_index(4), 2);
        assert_eq!(ladder_index(5), 0);
    }

    #[tokio::test]
    async fn first_attempt_uses_generic_checklist() {
        let reply = degraded().diagnose(1, "Maria", "No internet").await;
        assert!(reply.used_fallback);
        assert!(reply.text.contains(FIRST_ATTEMPT_FALLBACK));
        assert!(reply.text.contains("Tentativa 1/5"));
    }

    #[tokio::test]
    async fn retry_attempts_follow_the_ladder() {
        let remediator = degraded();
        let expected = [(2, 0), (3, 1), (4, 2), (5, 0)];
        for (attempt, index) in expected {
            let reply = remediator.diagnose(attempt, "Maria", "No internet").await;
            assert!(
                reply.text.contains(FALLBACK_LADDER[index]),
                "attempt {attempt} should use ladder item {index}"
            );
            assert!(reply.text.contains(&format!("Tentativa {attempt}/5")));
        }
    }

    #[tokio::test]
    async fn backend_answer_is_wrapped() {
        let backend = Arc::new(Scripted {
            answer: "  Reinicie o roteador.  ".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let remediator = Remediator::new(Arc::clone(&backend) as Arc<dyn GenerativeBackend>, Duration::from_secs(5));
        let reply = remediator.diagnose(1, "Maria Silva", "Sem internet").await;
        assert!(!reply.used_fallback);
        assert!(reply.text.contains("Reinicie o roteador."));
        assert!(reply.text.contains("Isso resolveu seu problema?"));

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Maria Silva"));
        assert!(prompts[0].contains("Sem internet"));
    }

    #[tokio::test]
    async fn blank_backend_answer_falls_back() {
        let backend = Arc::new(Scripted {
            answer: "   ".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let reply = Remediator::new(backend, Duration::from_secs(5))
            .diagnose(3, "Maria", "x")
            .await;
        assert!(reply.used_fallback);
        assert!(reply.text.contains(FALLBACK_LADDER[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_times_out_to_fallback() {
        let remediator = Remediator::new(Arc::new(Stalled), Duration::from_secs(2));
        let reply = remediator.diagnose(4, "Maria", "x").await;
        assert!(reply.used_fallback);
        assert!(reply.text.contains(FALLBACK_LADDER[2]));
    }

    #[tokio::test]
    async fn attempts_are_clamped() {
        let reply = degraded().diagnose(9, "Maria", "x").await;
        assert_eq!(reply.attempt, 5);
        let reply = degraded().diagnose(0, "Maria", "x").await;
        assert_eq!(reply.attempt, 1);
    }

    #[tokio::test]
    async fn free_answer_falls_back_on_failure() {
        assert_eq!(degraded().answer("Qual o horário?").await, FREE_ASSISTANT_FALLBACK);
    }

    #[test]
    fn continuation_prompt_mentions_attempt() {
        let prompt = diagnostic_prompt(3, "Maria", "Sem sinal");
        assert!(prompt.contains("tentativa 3/5"));
        assert!(prompt.contains("Sem sinal"));
    }
}
