// Built-in voice personas
//
// Every persona is a capture schema, an operation registry over it, a
// persona prompt and a storage location for its finalized records.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::normalize::{Normalizer, Timeline, CASE_STATUSES, IMPROV_PHASES, TUTOR_MODES};
use super::prompts::{library, PromptTemplate};
use super::registry::{Assignment, Branch, Operation, OperationRegistry};
use crate::domain::capture::errors::{CaptureError, CaptureResult};
use crate::domain::capture::schema::{CaptureSchema, FieldDef};
use crate::domain::repositories::RecordRepository;
use crate::infrastructure::repositories::{JsonDirectoryRepository, JsonLogRepository};

/// Rounds in one improv show
pub const IMPROV_ROUNDS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentVariant {
    Coffee,
    Lead,
    Wellness,
    Fraud,
    Tutor,
    Improv,
    Grocery,
}

/// Where finalized records of a persona are written, relative to the data dir
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Single JSON file holding `{ collection: [...] }`
    Log {
        file: &'static str,
        collection: &'static str,
    },
    /// One `<id>.json` file per record
    Directory { dir: &'static str },
}

impl AgentVariant {
    pub const ALL: [AgentVariant; 7] = [
        AgentVariant::Coffee,
        AgentVariant::Lead,
        AgentVariant::Wellness,
        AgentVariant::Fraud,
        AgentVariant::Tutor,
        AgentVariant::Improv,
        AgentVariant::Grocery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentVariant::Coffee => "coffee",
            AgentVariant::Lead => "lead",
            AgentVariant::Wellness => "wellness",
            AgentVariant::Fraud => "fraud",
            AgentVariant::Tutor => "tutor",
            AgentVariant::Improv => "improv",
            AgentVariant::Grocery => "grocery",
        }
    }

    /// Name the persona introduces itself with
    pub fn agent_name(&self) -> &'static str {
        match self {
            AgentVariant::Coffee => "Maya",
            AgentVariant::Lead => "Riley",
            AgentVariant::Wellness => "Alex",
            AgentVariant::Fraud => "Jordan from SecureBank",
            AgentVariant::Tutor => "the Teach-the-Tutor coach",
            AgentVariant::Improv => "the Improv Battle host",
            AgentVariant::Grocery => "Sam from FreshMart",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentVariant::Coffee => "Coffee shop barista taking drink orders",
            AgentVariant::Lead => "Sales development rep capturing leads",
            AgentVariant::Wellness => "Daily wellness check-in companion",
            AgentVariant::Fraud => "Bank fraud alert caller",
            AgentVariant::Tutor => "Active recall tutor",
            AgentVariant::Improv => "Improv game show host",
            AgentVariant::Grocery => "Grocery ordering assistant",
        }
    }

    pub fn prompt(&self) -> PromptTemplate {
        match self {
            AgentVariant::Coffee => library::barista(),
            AgentVariant::Lead => library::sales_rep(),
            AgentVariant::Wellness => library::wellness_companion(),
            AgentVariant::Fraud => library::fraud_agent(),
            AgentVariant::Tutor => library::tutor(),
            AgentVariant::Improv => library::improv_host(),
            AgentVariant::Grocery => library::grocery_assistant(),
        }
    }

    pub fn storage(&self) -> Storage {
        match self {
            AgentVariant::Coffee | AgentVariant::Grocery => Storage::Directory { dir: "orders" },
            AgentVariant::Lead => Storage::Log {
                file: "leads.json",
                collection: "leads",
            },
            AgentVariant::Wellness => Storage::Log {
                file: "wellness_log.json",
                collection: "entries",
            },
            AgentVariant::Fraud => Storage::Log {
                file: "fraud_cases.json",
                collection: "fraud_cases",
            },
            AgentVariant::Tutor => Storage::Log {
                file: "tutor_sessions.json",
                collection: "sessions",
            },
            AgentVariant::Improv => Storage::Log {
                file: "improv_shows.json",
                collection: "shows",
            },
        }
    }

    /// Builds the repository for this persona under `data_dir`
    pub fn repository(&self, data_dir: &Path) -> CaptureResult<Arc<dyn RecordRepository>> {
        let repository: Arc<dyn RecordRepository> = match self.storage() {
            Storage::Log { file, collection } => {
                Arc::new(JsonLogRepository::new(data_dir.join(file), collection))
            }
            Storage::Directory { dir } => Arc::new(
                JsonDirectoryRepository::new(data_dir.join(dir))
                    .with_id_prefix(self.schema()?.id_prefix()),
            ),
        };
        Ok(repository)
    }

    pub fn schema(&self) -> CaptureResult<CaptureSchema> {
        match self {
            AgentVariant::Coffee => CaptureSchema::new(
                "coffee",
                "ORD",
                vec![
                    FieldDef::text("drinkType", "Drink").required(),
                    FieldDef::text("size", "Size").required(),
                    FieldDef::text("milk", "Milk").required(),
                    FieldDef::list("extras", "Extras"),
                    FieldDef::text("name", "Name").required(),
                ],
                true,
            ),
            AgentVariant::Lead => CaptureSchema::new(
                "lead",
                "LEAD",
                vec![
                    FieldDef::text("name", "Name").required(),
                    FieldDef::text("company", "Company"),
                    FieldDef::text("email", "Email").required(),
                    FieldDef::text("role", "Role"),
                    FieldDef::text("use_case", "Use case").required(),
                    FieldDef::text("team_size", "Team size"),
                    FieldDef::choice("timeline", "Timeline", &Timeline::OPTIONS),
                ],
                false,
            ),
            AgentVariant::Wellness => CaptureSchema::new(
                "wellness",
                "CHK",
                vec![
                    FieldDef::text("mood", "Mood").required(),
                    FieldDef::text("energy_level", "Energy").required(),
                    FieldDef::list("stress_factors", "Stress factors"),
                    FieldDef::list("daily_objectives", "Objectives").required(),
                    FieldDef::list("self_care_intentions", "Self-care"),
                ],
                true,
            ),
            AgentVariant::Fraud => CaptureSchema::new(
                "fraud",
                "CASE",
                vec![
                    FieldDef::text("userName", "Customer").required(),
                    FieldDef::text("cardEnding", "Card ending"),
                    FieldDef::text("transactionName", "Merchant"),
                    FieldDef::text("transactionAmount", "Amount"),
                    FieldDef::text("transactionTime", "Time"),
                    FieldDef::text("transactionLocation", "Location"),
                    FieldDef::text("transactionCategory", "Category"),
                    FieldDef::text("transactionSource", "Source"),
                    FieldDef::flag("userConfirmedTransaction", "Customer made transaction"),
                    FieldDef::choice("status", "Status", &CASE_STATUSES).required(),
                    FieldDef::text("outcome", "Outcome").required(),
                ],
                true,
            ),
            AgentVariant::Tutor => CaptureSchema::new(
                "tutor",
                "TUT",
                vec![
                    FieldDef::choice("mode", "Mode", &TUTOR_MODES).required(),
                    FieldDef::text("concept", "Concept").required(),
                ],
                false,
            ),
            AgentVariant::Improv => CaptureSchema::new(
                "improv",
                "SHOW",
                vec![
                    FieldDef::text("player_name", "Player").required(),
                    FieldDef::choice("phase", "Phase", &IMPROV_PHASES),
                ],
                false,
            ),
            AgentVariant::Grocery => CaptureSchema::new(
                "grocery",
                "GRO",
                vec![
                    FieldDef::list("items", "Items").required(),
                    FieldDef::text("customer_name", "Name").required(),
                    FieldDef::text("address", "Address").required(),
                    FieldDef::text("notes", "Notes"),
                ],
                true,
            ),
        }
    }

    /// Builds the operation registry for this persona
    pub fn registry(&self) -> CaptureResult<OperationRegistry> {
        let registry = OperationRegistry::new(Arc::new(self.schema()?));

        match self {
            AgentVariant::Coffee => registry
                .with(
                    Operation::set(
                        "update_drink_type",
                        "drinkType",
                        Normalizer::Lowercase,
                        "Great choice, one {{value}}.",
                    )
                    .describe("Record the drink the customer wants"),
                )?
                .with(
                    Operation::set(
                        "update_size",
                        "size",
                        Normalizer::Lowercase,
                        "Got it, {{value}}.",
                    )
                    .describe("Record the drink size"),
                )?
                .with(
                    Operation::set(
                        "update_milk",
                        "milk",
                        Normalizer::Lowercase,
                        "{{value}} milk it is.",
                    )
                    .describe("Record the milk preference"),
                )?
                .with(
                    Operation::append(
                        "add_extra",
                        "extras",
                        Normalizer::Lowercase,
                        "Adding {{value}}.",
                    )
                    .describe("Add one extra (syrup, extra shot, whipped cream)"),
                )?
                .with(
                    Operation::set(
                        "update_name",
                        "name",
                        Normalizer::TitleCase,
                        "Thanks, {{value}}!",
                    )
                    .describe("Record the customer's name for the cup"),
                )?
                .with(
                    Operation::check_status(
                        "check_order_status",
                        "Your order: {{summary}}.",
                        "I still need your {{missing}}.",
                    )
                    .describe("Check what is still missing from the order"),
                )?
                .with(
                    Operation::finalize(
                        "complete_order",
                        "Order placed! {{summary}}. It will be ready shortly.",
                        "Before I place the order I still need your {{missing}}.",
                    )
                    .describe("Place the order once everything is captured"),
                ),

            AgentVariant::Lead => registry
                .with(
                    Operation::set(
                        "record_lead_name",
                        "name",
                        Normalizer::TitleCase,
                        "Nice to meet you, {{value}}.",
                    )
                    .describe("Record the prospect's name"),
                )?
                .with(
                    Operation::set(
                        "record_lead_company",
                        "company",
                        Normalizer::Trimmed,
                        "{{value}}, got it.",
                    )
                    .describe("Record the prospect's company"),
                )?
                .with(
                    Operation::set(
                        "record_lead_email",
                        "email",
                        Normalizer::Email,
                        "I'll send details to {{value}}.",
                    )
                    .describe("Record the prospect's email address"),
                )?
                .with(
                    Operation::set(
                        "record_lead_role",
                        "role",
                        Normalizer::Trimmed,
                        "Thanks, noted your role as {{value}}.",
                    )
                    .describe("Record the prospect's role"),
                )?
                .with(
                    Operation::set(
                        "record_use_case",
                        "use_case",
                        Normalizer::Trimmed,
                        "That's a great fit.",
                    )
                    .describe("Record what they want to use the product for"),
                )?
                .with(
                    Operation::set(
                        "record_team_size",
                        "team_size",
                        Normalizer::Trimmed,
                        "Team of {{value}}, noted.",
                    )
                    .describe("Record the team size"),
                )?
                .with(
                    Operation::set(
                        "record_timeline",
                        "timeline",
                        Normalizer::Timeline,
                        "Timeline noted as {{value}}.",
                    )
                    .describe("Record when they want to get started"),
                )?
                .with(
                    Operation::log(
                        "log_question",
                        "question",
                        "Good question, I've made a note of it.",
                    )
                    .describe("Log a question the prospect asked"),
                )?
                .with(
                    Operation::check_status(
                        "check_lead_completeness",
                        "I have everything I need: {{summary}}.",
                        "I'd still love to know your {{missing}}.",
                    )
                    .describe("Check which lead details are missing"),
                )?
                .with(
                    Operation::finalize(
                        "complete_call_and_save_lead",
                        "Thanks for your time! Here's what I have: {{summary}}.",
                        "Before we wrap up, could you share your {{missing}}?",
                    )
                    .describe("Save the lead at the end of the call"),
                ),

            AgentVariant::Wellness => registry
                .with(
                    Operation::set(
                        "record_mood",
                        "mood",
                        Normalizer::Lowercase,
                        "Thanks for sharing that you're feeling {{value}}.",
                    )
                    .describe("Record how the user feels today"),
                )?
                .with(
                    Operation::set(
                        "record_energy_level",
                        "energy_level",
                        Normalizer::Lowercase,
                        "Energy {{value}}, noted.",
                    )
                    .describe("Record the user's energy level"),
                )?
                .with(
                    Operation::append(
                        "add_stress_factor",
                        "stress_factors",
                        Normalizer::Trimmed,
                        "That sounds like a lot. I've noted it.",
                    )
                    .describe("Add something that is causing stress"),
                )?
                .with(
                    Operation::append(
                        "add_daily_objective",
                        "daily_objectives",
                        Normalizer::Trimmed,
                        "Added '{{value}}' to today's goals.",
                    )
                    .describe("Add one objective for today"),
                )?
                .with(
                    Operation::append(
                        "add_self_care_intention",
                        "self_care_intentions",
                        Normalizer::Trimmed,
                        "Love that: {{value}}.",
                    )
                    .describe("Add a self-care intention"),
                )?
                .with(
                    Operation::recall_previous(
                        "get_previous_context",
                        "This is our first check-in.",
                        "Last time, on {{date}}: {{summary}}.",
                    )
                    .describe("Recall the previous check-in"),
                )?
                .with(
                    Operation::check_status(
                        "check_wellness_status",
                        "Here's your check-in: {{summary}}.",
                        "We still haven't covered your {{missing}}.",
                    )
                    .describe("Check what is left to cover"),
                )?
                .with(
                    Operation::finalize(
                        "complete_checkin",
                        "Check-in saved. {{summary}}. Take care!",
                        "Before we finish, let's talk about your {{missing}}.",
                    )
                    .describe("Save today's check-in"),
                ),

            AgentVariant::Fraud => {
                let found = Branch::new(
                    "Thank you, {{userName}}. I have your case pulled up. Before we go on I need \
                     to verify your identity. {{securityQuestion}}",
                )
                .set("status", "pending_review");
                let passed = "Thank you for verifying your identity. On {{transactionTime}} we \
                              noticed a charge of {{transactionAmount}} to {{transactionName}} \
                              from {{transactionLocation}}, made through {{transactionSource}} \
                              for {{transactionCategory}}. Did you make this purchase?";
                let failed = Branch::new(
                    "I'm sorry, but that answer doesn't match our records. For your security I \
                     cannot proceed with this call. Please contact SecureBank directly or visit \
                     your nearest branch with a valid ID.",
                )
                .set("status", "verification_failed")
                .set(
                    "outcome",
                    "Customer failed identity verification. Advised to contact bank directly.",
                );
                let made = Branch::new(
                    "Thank you for confirming. The transaction is marked as legitimate and no \
                     further action is needed.",
                )
                .set("status", "confirmed_safe")
                .set(
                    "outcome",
                    "Customer confirmed the transaction as legitimate. No action required.",
                );
                let denied = Branch::new(
                    "Understood. I've blocked your card ending in {{cardEnding}}, opened a \
                     dispute for the charge and ordered you a new card.",
                )
                .set("status", "confirmed_fraud")
                .set(
                    "outcome",
                    "Customer denied making the transaction. Card blocked, dispute initiated, \
                     new card being issued.",
                );
                registry
                    .with(
                        Operation::load_case(
                            "load_fraud_case_by_username",
                            "userName",
                            Normalizer::Lowercase,
                            found,
                            "I don't have a case on file for {{value}}. Can you check the name?",
                        )
                        .describe("Pull up the customer's fraud case by their user name"),
                    )?
                    .with(
                        Operation::verify(
                            "verify_customer_identity",
                            "securityAnswer",
                            passed,
                            failed,
                            "I need to pull up your case first. What is your name?",
                        )
                        .describe("Check the customer's answer to the security question"),
                    )?
                    .with(
                        Operation::decide(
                            "record_transaction_confirmation",
                            "userConfirmedTransaction",
                            made,
                            denied,
                            "I need to verify your identity before we discuss the transaction.",
                        )
                        .describe("Record whether the customer made the flagged transaction"),
                    )?
                    .with(
                        Operation::check_status(
                            "get_case_status",
                            "Case summary: {{summary}}.",
                            "The case still needs {{missing}}.",
                        )
                        .describe("Check the state of the case"),
                    )?
                    .with(
                        Operation::finalize(
                            "end_fraud_call",
                            "Thank you, {{userName}}. Your case has been updated. Goodbye.",
                            "Before we end the call I need the {{missing}}.",
                        )
                        .describe("Close the case at the end of the call"),
                    )
            }

            AgentVariant::Tutor => registry
                .with(
                    Operation::set(
                        "switch_mode",
                        "mode",
                        Normalizer::TutorMode,
                        "Switching to {{value}} mode.",
                    )
                    .describe("Switch between learn, quiz and teach back"),
                )?
                .with(
                    Operation::set(
                        "set_concept",
                        "concept",
                        Normalizer::Lowercase,
                        "Let's work on {{value}}.",
                    )
                    .describe("Record the concept being studied"),
                )?
                .with(
                    Operation::log("record_score", "score", "Score recorded: {{value}}.")
                        .describe("Log a quiz or teach-back score"),
                )?
                .with(
                    Operation::check_status(
                        "get_current_mode",
                        "{{summary}}.",
                        "We haven't chosen a {{missing}} yet.",
                    )
                    .describe("Report the current mode and concept"),
                )?
                .with(
                    Operation::finalize(
                        "end_session",
                        "Great session! {{summary}}.",
                        "Before we stop, pick a {{missing}}.",
                    )
                    .describe("Save the study session"),
                ),

            AgentVariant::Improv => {
                let last_round = Branch::new("That was our final round! Let's wrap up the show.")
                    .set("phase", "done");
                registry
                    .with(
                        Operation::set(
                            "set_player_name",
                            "player_name",
                            Normalizer::TitleCase,
                            "Welcome to Improv Battle, {{value}}!",
                        )
                        .describe("Record the contestant's name"),
                    )?
                    .with(
                        Operation::start_round(
                            "start_round",
                            "round",
                            IMPROV_ROUNDS,
                            Assignment::new("phase", "awaiting_improv"),
                            "Round {{round}}! Here's your scenario: {{value}}. Take it away!",
                            last_round,
                        )
                        .describe("Start the next round with a scenario"),
                    )?
                    .with(
                        Operation::react(
                            "react_to_performance",
                            "round",
                            "reaction",
                            IMPROV_ROUNDS,
                            Assignment::new("phase", "reacting"),
                            "{{value}} Ready for the next challenge?",
                            "{{value}} That wraps up our final round!",
                            "Let's play a round first.",
                        )
                        .describe("React to the performance in the current round"),
                    )?
                    .with(
                        Operation::check_status(
                            "get_game_status",
                            "{{summary}}.",
                            "We still need your {{missing}}.",
                        )
                        .describe("Report the state of the show"),
                    )?
                    .with(
                        Operation::finalize(
                            "end_show",
                            "That's a wrap! Thanks for playing.",
                            "Before we close, who are we playing with? I need the {{missing}}.",
                        )
                        .describe("End the show and save it")
                        .closing("phase", "done"),
                    )
            }

            AgentVariant::Grocery => registry
                .with(
                    Operation::append(
                        "add_item_to_cart",
                        "items",
                        Normalizer::Trimmed,
                        "Added {{value}} to your cart.",
                    )
                    .describe("Add one item (with quantity) to the cart"),
                )?
                .with(
                    Operation::set(
                        "set_customer_name",
                        "customer_name",
                        Normalizer::TitleCase,
                        "Thanks, {{value}}.",
                    )
                    .describe("Record the customer's name"),
                )?
                .with(
                    Operation::set(
                        "set_delivery_address",
                        "address",
                        Normalizer::Trimmed,
                        "Delivering to {{value}}.",
                    )
                    .describe("Record the delivery address"),
                )?
                .with(
                    Operation::set(
                        "set_order_notes",
                        "notes",
                        Normalizer::Trimmed,
                        "Noted: {{value}}.",
                    )
                    .describe("Record delivery notes"),
                )?
                .with(
                    Operation::check_status(
                        "show_cart",
                        "Here's your order: {{summary}}.",
                        "I still need your {{missing}}.",
                    )
                    .describe("Read the cart back"),
                )?
                .with(
                    Operation::finalize(
                        "complete_order",
                        "Order placed! {{summary}}.",
                        "To place the order I still need your {{missing}}.",
                    )
                    .describe("Place the order"),
                ),
        }
    }
}

impl std::fmt::Display for AgentVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentVariant {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentVariant::ALL
            .into_iter()
            .find(|variant| variant.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| CaptureError::Configuration(format!("unknown agent variant '{}'", s)))
    }
}
