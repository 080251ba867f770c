//! Per-kind grading contexts.
//!
//! Each evaluation kind selects its own system context; scenario metadata
//! supplied by the caller is folded in when present. The exact wording is
//! a collaborator concern and deliberately brief here, but every context
//! pins the response shape the aggregator expects: a JSON object whose
//! `Evaluacion` key groups dimensions of numeric sub-scores.

use oratia_core::types::EvaluationKind;
use serde::{Deserialize, Serialize};

/// Default objective for coach sessions submitted without scenario
/// metadata.
const DEFAULT_COACH_OBJECTIVE: &str = "mejorar la comunicación oral del alumno";

/// Scenario metadata supplied by the caller alongside a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioContext {
    /// Simulated counterpart profile (e.g. "cliente escéptico").
    pub profile: Option<String>,
    /// Scenario name shown to the student.
    pub scenario: Option<String>,
    /// What the student was asked to achieve.
    pub objective: Option<String>,
}

impl ScenarioContext {
    /// Whether the caller supplied any scenario metadata at all.
    pub fn is_empty(&self) -> bool {
        self.profile.is_none() && self.scenario.is_none() && self.objective.is_none()
    }
}

/// One grading call: the normalized transcript plus everything needed to
/// select the system context.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    pub kind: EvaluationKind,
    pub transcript: String,
    pub scenario: ScenarioContext,
}

/// Build the system context for a grading call.
pub fn system_context(kind: EvaluationKind, scenario: &ScenarioContext) -> String {
    let base = match kind {
        EvaluationKind::Roleplay => {
            "Eres un evaluador de sesiones de roleplay de ventas. Analiza la \
             conversación entre Usuario y Agente y responde únicamente con un \
             JSON cuya clave Evaluacion agrupe dimensiones con subpuntuaciones \
             de 0 a 100 y un campo Comentarios por dimensión."
        }
        EvaluationKind::Coach => {
            "Eres un coach de comunicación oral. Evalúa la sesión de práctica \
             del Usuario y responde únicamente con un JSON cuya clave \
             Evaluacion agrupe dimensiones con subpuntuaciones de 0 a 100 y un \
             campo Comentarios por dimensión."
        }
        EvaluationKind::Diagnostic => {
            "Eres un analista de entrevistas diagnósticas. Evalúa la entrevista \
             del Usuario y responde únicamente con un JSON cuya clave \
             Evaluacion agrupe dimensiones con subpuntuaciones de 0 a 100, un \
             campo Comentarios por dimensión y un resumen general."
        }
        EvaluationKind::TechWeek => {
            "Eres un evaluador de retos semanales de técnica vocal. Evalúa el \
             ejercicio del Usuario y responde únicamente con un JSON cuya clave \
             Evaluacion agrupe dimensiones con subpuntuaciones de 0 a 100 y un \
             campo Comentarios por dimensión."
        }
    };

    let mut context = base.to_string();
    if let Some(profile) = &scenario.profile {
        context.push_str(&format!("\nPerfil del interlocutor: {profile}."));
    }
    if let Some(name) = &scenario.scenario {
        context.push_str(&format!("\nEscenario: {name}."));
    }
    if let Some(objective) = &scenario.objective {
        context.push_str(&format!("\nObjetivo de la sesión: {objective}."));
    } else if kind == EvaluationKind::Coach {
        context.push_str(&format!("\nObjetivo de la sesión: {DEFAULT_COACH_OBJECTIVE}."));
    }
    context
}
