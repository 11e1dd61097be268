//! Fixed reply texts shown to callers.

pub const MAIN_MENU: &str = "*QI TELECOM | Menu Principal 🛰️*

Bem-vindo ao QIChatBot!
Digite apenas o *número* da opção desejada:

[1] Suporte Técnico
    - Problemas com internet, modem ou instalação

[2] Planos e Serviços
    - Conhecer planos ou solicitar upgrade

[3] Boleto e Financeiro
    - Segunda via e questões financeiras

[4] Assistente Livre
    - Chat livre para qualquer dúvida

Digite sua opção (1-4):";

pub const FINANCIAL_INFO: &str = "💰 *Boleto e Financeiro*

Para *segunda via* ou dúvidas financeiras, utilize os canais oficiais:

*Unidade / Responsável*
Francisco Alves: Av. Brigadeiro Faria Lima 703 - Centro | (44) 3643-1736

Iporã: Rua Katsuo Nakata 1115 - Centro | (44) 98402-7130 / (44) 3199-9115

Palotina: Aldir Pedron 1319 - Centro | (44) 3649-1486

Terra Roxa: Av. da Saudade 369 - Centro | (44) 3645-3257

⚠️ *Aplicativo de boletos em desenvolvimento. Em breve novidades.*

Digite MENU para voltar ao menu principal.";

pub const PLAN_LIST: &str = "• *QI FIBRA BASIC*
  300 Mega + QI TV PLAY + IPV6

• *QI FIBRA PREMIUM*
  600 Mega + QI TV PLAY + IPV6 + QUALIDADE QI

• *QI FIBRA PREMIUM (MELHOR)*
  650 Mega + QI TV PLAY + IPV6 + PARAMOUNT + WATCH TV

• *QI FIBRA PREMIUM TOP*
  700 Mega + QI TV PLAY + IPV6 + PARAMOUNT + WATCH TV";

pub const SUPPORT_SELECTED: &str =
    "🔧 *Suporte Técnico Selecionado*\n\nPara melhor atendê-lo, preciso do seu *nome completo*:";

pub const PLANS_SELECTED: &str = "📋 *Planos e Serviços*\n\nVocê já é cliente QI TELECOM? \
Responda *SIM* ou *NÃO*.\n\n(Após responder, mostrarei as opções de planos.)";

pub const FREE_ASSISTANT_SELECTED: &str = "🤖 *Assistente Livre Ativado*\n\nAgora você pode fazer \
qualquer pergunta que quiser! Estou aqui para ajudar.\n\nDigite *MENU* para voltar ao menu principal.";

pub const SUPPORT_RESOLVED: &str = "🎉 *Ótimo! Problema resolvido!*\n\nPoderia nos dar um \
*feedback/opinião* sobre nosso atendimento? (Ex: Excelente, Bom, Regular...)";

pub const SUPPORT_ESCALATED: &str = "🚨 *Encaminhamento para Técnico Especializado*\n\n\
📅 Prazo: 24-48 horas\n📞 Entraremos em contato.\n\nAntes de finalizar, poderia avaliar nosso \
atendimento? (Ex: Excelente, Bom, Regular...)";

pub const DIAGNOSIS_REPROMPT: &str =
    "Por favor, responda apenas *SIM* ou *NÃO* para que eu possa ajudá-lo melhor.";

pub const FEEDBACK_COMMENT_PROMPT: &str = "💭 *Obrigado pela avaliação!*\n\nPara finalizar, tem \
alguma *sugestão* ou *comentário* para melhorarmos nosso atendimento?\n\n\
*(Digite sua sugestão ou 'NÃO' se não tiver)*";

pub const FEEDBACK_RECORDED: &str = "🙏 *Feedback registrado com sucesso!* \n\nSua opinião é \
muito importante para melhorarmos nossos serviços.\n\nDigite *MENU* para voltar ao menu principal.";

pub const CLIENT_CHECK_REPROMPT: &str = "Por favor, responda *SIM* ou *NÃO*.";

pub const KEEP_CURRENT_PLAN: &str = "✅ *Entendido!*\n\nVocê optou por manter seu plano atual. \
Se mudar de ideia, estaremos aqui!\n\nDigite *MENU* para voltar ao menu principal.";

pub const CONTACT_NAME_PROMPT: &str =
    "📝 *Dados para Contato*\n\nPara avançar, preciso do seu *nome completo*:";

pub const CONTACT_PHONE_PROMPT: &str = "📞 Agora informe um *telefone/WhatsApp* para contato \
(somente números ou formato (XX) XXXXX-XXXX):";

pub fn support_problem_prompt(name: &str) -> String {
    format!(
        "Obrigado, {name}! 👋\n\nAgora, descreva detalhadamente o problema técnico que você está enfrentando:"
    )
}

pub fn current_customer_prompt() -> String {
    format!(
        "👤 *Cliente Atual Identificado*\n\nQual seu *plano atual*? Digite exatamente uma das opções abaixo:\n\n{PLAN_LIST}"
    )
}

pub fn new_customer_prompt() -> String {
    format!(
        "🆕 *Novo Cliente - Bem-vindo!*\n\nPerfeito! Qual plano desperta seu interesse?\n\n{PLAN_LIST}"
    )
}

pub fn upgrade_prompt(current_plan: &str) -> String {
    format!(
        "📋 *Plano Atual: {current_plan}*\n\nGostaria de fazer *upgrade*? Veja nossas opções superiores:\n\n{PLAN_LIST}\n\n\
Ou digite *MANTER ATUAL* para continuar com o seu plano."
    )
}

pub fn plan_inquiry_registered(name: &str, situation: &str, desired_plan: &str, phone: &str) -> String {
    format!(
        "🎉 *Dados Registrados com Sucesso!*\n\n*Nome*: {name}\n*Situação*: {situation}\n\
*Plano Interesse*: {desired_plan}\n*Telefone*: {phone}\n\n📞 *Próximos Passos*:\n\
Nossa equipe comercial entrará em contato em até 24 horas para finalizar!\n\n\
Digite *MENU* para voltar ao menu principal."
    )
}
