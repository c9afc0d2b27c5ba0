//! Catalog
//!
//! Immutable template data consumed by the flow: analysis step/task templates,
//! the hospital list, canned assistant replies, symptom quick-pick tags and the
//! mock recommendation table shown once analysis finishes.

use std::collections::HashSet;
use std::path::Path;

use guided_triage_core::{CoreError, CoreResult, Hospital, Step, StepStatus, Task};
use serde::{Deserialize, Serialize};

/// Template for a task; instantiated as a pending [`Task`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    pub name: String,
    /// Present when the user can complete the task themselves
    #[serde(default)]
    pub action_label: Option<String>,
}

impl TaskTemplate {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            action_label: None,
        }
    }

    fn with_action(mut self, label: &str) -> Self {
        self.action_label = Some(label.to_string());
        self
    }

    fn instantiate(&self) -> Task {
        let task = Task::new(self.id.clone(), self.name.clone());
        match &self.action_label {
            Some(label) => task.with_action(label.clone()),
            None => task,
        }
    }
}

/// Template for an analysis step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub description: String,
    pub tasks: Vec<TaskTemplate>,
}

impl StepTemplate {
    fn instantiate(&self) -> Step {
        Step {
            id: self.id.clone(),
            title: self.title.clone(),
            icon: self.icon.clone(),
            description: self.description.clone(),
            tasks: self.tasks.iter().map(TaskTemplate::instantiate).collect(),
            overall_status: StepStatus::Pending,
            overall_progress: 0,
            confidence: None,
            expanded: false,
            can_proceed: false,
        }
    }
}

/// Doctor listed under a department recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub title: String,
    pub specialty: String,
    pub experience: String,
    pub schedule: Vec<String>,
}

/// Department recommended at the end of the flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRecommendation {
    pub id: String,
    pub name: String,
    pub confidence: u8,
    pub reason: String,
    pub location: String,
    pub schedule: String,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
}

/// Read-only template and reference data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub steps: Vec<StepTemplate>,
    pub hospitals: Vec<Hospital>,
    /// Indexed by conversational turn, clamped to the last entry
    pub replies: Vec<String>,
    #[serde(default)]
    pub symptom_tags: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<DepartmentRecommendation>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The built-in catalog
    pub fn builtin() -> Self {
        let steps = vec![
            StepTemplate {
                id: "info-summary".to_string(),
                title: "Information summary".to_string(),
                icon: "📋".to_string(),
                description: "Summarizing your consultation details...".to_string(),
                tasks: vec![
                    TaskTemplate::new("symptom-analysis", "Symptom description analysis"),
                    TaskTemplate::new("timeline-organize", "Onset timeline"),
                    TaskTemplate::new("medical-history", "Medical history check")
                        .with_action("Add"),
                    TaskTemplate::new("medication-check", "Current medication check")
                        .with_action("Add"),
                    TaskTemplate::new("hospital-confirm", "Target hospital confirmation"),
                    TaskTemplate::new("lab-results", "Lab result interpretation")
                        .with_action("Upload"),
                ],
            },
            StepTemplate {
                id: "hospital-info".to_string(),
                title: "Hospital information".to_string(),
                icon: "🏥".to_string(),
                description: "Looking up hospital information...".to_string(),
                tasks: vec![
                    TaskTemplate::new("official-data", "Official site data"),
                    TaskTemplate::new("department-setup", "Department structure"),
                    TaskTemplate::new("treatment-scope", "Treatment scope"),
                    TaskTemplate::new("clinic-hours", "Clinic hours"),
                    TaskTemplate::new("specialty-treatment", "Specialty treatments"),
                ],
            },
            StepTemplate {
                id: "doctor-info".to_string(),
                title: "Doctor information".to_string(),
                icon: "👨‍⚕️".to_string(),
                description: "Looking up specialist teams...".to_string(),
                tasks: vec![
                    TaskTemplate::new("orthopedics-team", "Orthopedics specialists"),
                    TaskTemplate::new("thoracic-team", "Thoracic surgery specialists"),
                    TaskTemplate::new("academic-background", "Academic background"),
                    TaskTemplate::new("specialty-matching", "Specialty matching"),
                    TaskTemplate::new("schedule-query", "Clinic schedule"),
                    TaskTemplate::new("patient-reviews", "Patient reviews"),
                ],
            },
            StepTemplate {
                id: "reasoning-analysis".to_string(),
                title: "Reasoning".to_string(),
                icon: "🤔".to_string(),
                description: "Running the recommendation analysis...".to_string(),
                tasks: vec![
                    TaskTemplate::new("symptom-factors", "Symptom factor analysis"),
                    TaskTemplate::new("patient-evaluation", "Patient profile evaluation"),
                    TaskTemplate::new("department-matching", "Department matching"),
                    TaskTemplate::new("doctor-ranking", "Doctor ranking"),
                    TaskTemplate::new("schedule-optimization", "Visit time optimization"),
                    TaskTemplate::new("risk-assessment", "Risk assessment"),
                ],
            },
        ];

        let hospitals = vec![
            Hospital::new("zrfy", "China-Japan Friendship Hospital", "General hospital"),
            Hospital::new("bjcy", "Beijing Chaoyang Hospital", "General hospital"),
            Hospital::new("bdkq", "Peking University Hospital of Stomatology", "Specialist hospital"),
        ];

        let replies = [
            "I understand your symptoms. Is anything else bothering you?",
            "How long have you had these symptoms?",
            "Was there a trigger, such as an injury or overexertion?",
            "Have you had similar symptoms before?",
            "Thanks, I have enough to go on. Let me work out the most suitable department for you.",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let symptom_tags = [
            // Thoracic
            "Chest pain",
            "Rib pain",
            "Chest injury",
            "Chest wall lump",
            "Shortness of breath",
            // Orthopedic
            "Joint pain",
            "Lower back and leg pain",
            "Neck and shoulder pain",
            "Fracture",
            "Muscle pain",
            // Dental
            "Toothache",
            "Wisdom tooth pain",
            "Bleeding gums",
            "Dental injury",
            "Limited mouth opening",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let recommendations = vec![
            DepartmentRecommendation {
                id: "orthopedics".to_string(),
                name: "Orthopedics".to_string(),
                confidence: 95,
                reason: "Chest pain following an injury that worsens on deep breathing points \
                         to a rib or chest wall soft tissue injury. Orthopedics can order the \
                         imaging and treatment this needs."
                    .to_string(),
                location: "Outpatient building, 3rd floor".to_string(),
                schedule: "Monday to Friday, all day".to_string(),
                doctors: vec![Doctor {
                    id: "zhang".to_string(),
                    name: "Dr. Zhang".to_string(),
                    title: "Chief physician".to_string(),
                    specialty: "Chest wall trauma, rib fractures".to_string(),
                    experience: "30 years of clinical practice".to_string(),
                    schedule: vec!["Tuesday morning".to_string(), "Thursday afternoon".to_string()],
                }],
            },
            DepartmentRecommendation {
                id: "thoracic-surgery".to_string(),
                name: "Thoracic surgery".to_string(),
                confidence: 75,
                reason: "Breathing-related chest pain; intrathoracic causes should be ruled out."
                    .to_string(),
                location: "Outpatient building, 4th floor".to_string(),
                schedule: "Monday to Friday, mornings".to_string(),
                doctors: vec![],
            },
        ];

        Self {
            steps,
            hospitals,
            replies,
            symptom_tags,
            recommendations,
        }
    }

    /// Load a catalog from a JSON file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check the structural assumptions the flow relies on
    pub fn validate(&self) -> CoreResult<()> {
        if self.steps.is_empty() {
            return Err(CoreError::validation("catalog has no analysis steps"));
        }
        if self.replies.is_empty() {
            return Err(CoreError::validation("catalog has no canned replies"));
        }

        let mut step_ids = HashSet::new();
        for step in &self.steps {
            if !step_ids.insert(step.id.as_str()) {
                return Err(CoreError::validation(format!("duplicate step id '{}'", step.id)));
            }
            let mut task_ids = HashSet::new();
            for task in &step.tasks {
                if !task_ids.insert(task.id.as_str()) {
                    return Err(CoreError::validation(format!(
                        "duplicate task id '{}' in step '{}'",
                        task.id, step.id
                    )));
                }
            }
        }

        let mut hospital_ids = HashSet::new();
        for hospital in &self.hospitals {
            if !hospital_ids.insert(hospital.id.as_str()) {
                return Err(CoreError::validation(format!(
                    "duplicate hospital id '{}'",
                    hospital.id
                )));
            }
        }
        Ok(())
    }

    /// A fresh, independent step sequence with every task pending
    pub fn fresh_steps(&self) -> Vec<Step> {
        self.steps.iter().map(StepTemplate::instantiate).collect()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn hospital(&self, hospital_id: &str) -> Option<&Hospital> {
        self.hospitals.iter().find(|h| h.id == hospital_id)
    }

    pub fn has_symptom_tag(&self, tag: &str) -> bool {
        self.symptom_tags.iter().any(|t| t == tag)
    }

    /// Reply for a 0-based turn, clamped to the last canned reply
    pub fn reply_for_turn(&self, turn: usize) -> &str {
        let index = turn.min(self.replies.len().saturating_sub(1));
        self.replies.get(index).map(String::as_str).unwrap_or_default()
    }
}
