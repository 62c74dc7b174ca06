//! The built-in dengue severity flowchart (groups A–D).
//!
//! Step data and step texts are declared side by side but stored apart:
//! the engine only ever sees [`steps`].

use super::presentation::StepText;
use crate::graph::{AutoCheck, AutoRule, Step};
use crate::{Group, StepKind};

/// Step table of the dengue flowchart.
pub(crate) fn steps() -> Vec<Step> {
    vec![
        // ---------------------------------------------------------------- entry
        Step::new("start", StepKind::Question).with_option("Begin assessment", "alarm_check"),
        Step::new("alarm_check", StepKind::Question)
            .with_answer("No alarm signs", "bleeding_check", "absent")
            .with_answer("One or more alarm signs", "shock_check", "present"),
        Step::new("bleeding_check", StepKind::Question)
            .with_answer("No bleeding and no risk condition", "group_a", "absent")
            .with_answer(
                "Skin bleeding, positive tourniquet test or risk condition",
                "group_b",
                "present",
            ),
        Step::new("shock_check", StepKind::Question)
            .with_answer("No signs of shock", "group_c", "absent")
            .with_answer("Shock, severe bleeding or organ dysfunction", "group_d", "present"),
        // -------------------------------------------------------------- group A
        Step::new("group_a", StepKind::Group)
            .in_group(Group::A)
            .with_option("Start treatment", "hydration_a"),
        Step::new("hydration_a", StepKind::Action)
            .in_group(Group::A)
            .with_option("Oral hydration prescribed", "end_group_a"),
        Step::new("end_group_a", StepKind::Result)
            .in_group(Group::A)
            .with_option("Finish", "end"),
        // -------------------------------------------------------------- group B
        Step::new("group_b", StepKind::Group)
            .in_group(Group::B)
            .with_option("Blood count requested", "hydration_b"),
        Step::new("hydration_b", StepKind::Action)
            .in_group(Group::B)
            .with_option("Hydration started, blood drawn", "wait_labs_b"),
        Step::new("wait_labs_b", StepKind::WaitLabs)
            .in_group(Group::B)
            .requiring_labs()
            .with_auto(AutoRule::new(
                AutoCheck::Hemoconcentration,
                "group_d",
                "group_c",
                "labs_normal_b",
            )),
        Step::new("labs_normal_b", StepKind::Result)
            .in_group(Group::B)
            .with_option("Finish", "end"),
        // -------------------------------------------------------------- group C
        Step::new("group_c", StepKind::Group)
            .in_group(Group::C)
            .with_option("Start intravenous hydration", "hydration_c"),
        Step::new("hydration_c", StepKind::Action)
            .in_group(Group::C)
            .with_option("Expansion completed", "reassess_c"),
        Step::new("reassess_c", StepKind::WaitLabs)
            .in_group(Group::C)
            .with_auto(AutoRule::new(
                AutoCheck::Escalation,
                "group_d",
                "reexpansion_c",
                "maintenance_c",
            )),
        Step::new("reexpansion_c", StepKind::Action)
            .in_group(Group::C)
            .with_option("Re-expansion completed", "response_c"),
        Step::new("response_c", StepKind::Question)
            .in_group(Group::C)
            .with_answer("Clinical and laboratory improvement", "maintenance_c", "improved")
            .with_answer("No improvement after three expansions", "group_d", "refractory"),
        Step::new("maintenance_c", StepKind::Action)
            .in_group(Group::C)
            .with_option("Maintenance hydration started", "end_group_c"),
        Step::new("end_group_c", StepKind::Result)
            .in_group(Group::C)
            .with_option("Finish", "end"),
        // -------------------------------------------------------------- group D
        Step::new("group_d", StepKind::Group)
            .in_group(Group::D)
            .with_option("Start resuscitation", "resuscitation_d"),
        Step::new("resuscitation_d", StepKind::Action)
            .in_group(Group::D)
            .with_option("Expansion cycle completed", "reassess_d"),
        Step::new("reassess_d", StepKind::Question)
            .in_group(Group::D)
            .with_answer("Hemodynamic improvement", "intensive_care", "improved")
            .with_answer(
                "Persistent shock, hematocrit rising",
                "intensive_care",
                "hemoconcentrating",
            )
            .with_answer(
                "Persistent shock, hematocrit falling",
                "bleeding_investigation",
                "hematocrit_falling",
            ),
        Step::new("bleeding_investigation", StepKind::Action)
            .in_group(Group::D)
            .with_option("Bleeding source managed", "intensive_care"),
        Step::new("intensive_care", StepKind::Action)
            .in_group(Group::D)
            .with_option("Intensive care admission arranged", "end_group_d"),
        Step::new("end_group_d", StepKind::Result)
            .in_group(Group::D)
            .with_option("Finish", "end"),
        // ----------------------------------------------------------------- exit
        Step::new("end", StepKind::Result).with_option("Start a new assessment", "start"),
    ]
}

/// Titles and descriptions of the dengue flowchart.
pub(crate) fn texts() -> Vec<(&'static str, StepText)> {
    vec![
        (
            "start",
            StepText::new(
                "Suspected dengue",
                "Fever for 2 to 7 days with at least two of: nausea or vomiting, rash, \
                 myalgia or arthralgia, headache, retro-orbital pain, petechiae, leukopenia.",
            ),
        ),
        (
            "alarm_check",
            StepText::new(
                "Alarm signs",
                "Intense continuous abdominal pain, persistent vomiting, fluid accumulation, \
                 postural hypotension or lipothymia, hepatomegaly over 2 cm, mucosal bleeding, \
                 lethargy or irritability, progressive hematocrit rise.",
            ),
        ),
        (
            "bleeding_check",
            StepText::new(
                "Bleeding and risk conditions",
                "Spontaneous skin bleeding or positive tourniquet test; age under 2 or over 65, \
                 pregnancy, comorbidities or social vulnerability.",
            ),
        ),
        (
            "shock_check",
            StepText::new(
                "Signs of shock",
                "Weak or absent pulse, capillary refill over 2 seconds, convergent or \
                 unmeasurable blood pressure, tachycardia, cold extremities, severe bleeding \
                 or severe organ dysfunction.",
            ),
        ),
        (
            "group_a",
            StepText::new("Group A", "No alarm signs, no bleeding, no risk condition. Outpatient care."),
        ),
        (
            "hydration_a",
            StepText::new(
                "Oral hydration",
                "60 mL/kg/day for adults, one third as oral rehydration solution (SRO). \
                 Symptomatic treatment with dipyrone or paracetamol; avoid salicylates and NSAIDs.",
            ),
        ),
        (
            "end_group_a",
            StepText::new(
                "Outpatient follow-up",
                "Return on the day fever subsides or immediately on any alarm sign.",
            ),
        ),
        (
            "group_b",
            StepText::new(
                "Group B",
                "Skin bleeding or risk condition without alarm signs. Observation unit; \
                 blood count is mandatory.",
            ),
        ),
        (
            "hydration_b",
            StepText::new(
                "Hydration while awaiting labs",
                "Oral hydration as in Group A, started in the unit while the blood count is processed.",
            ),
        ),
        (
            "wait_labs_b",
            StepText::new(
                "Evaluating blood count",
                "Hemoconcentration and vital signs are checked automatically.",
            ),
        ),
        (
            "labs_normal_b",
            StepText::new(
                "Blood count within range",
                "Continue outpatient treatment as Group A with daily reassessment.",
            ),
        ),
        (
            "group_c",
            StepText::new(
                "Group C",
                "Alarm signs present. Admit; start intravenous hydration immediately.",
            ),
        ),
        (
            "hydration_c",
            StepText::new(
                "Volume expansion",
                "Isotonic crystalloid 10 mL/kg in the first hour.",
            ),
        ),
        (
            "reassess_c",
            StepText::new(
                "Reassessment",
                "Vital signs after expansion are checked automatically.",
            ),
        ),
        (
            "reexpansion_c",
            StepText::new(
                "Repeat expansion",
                "Repeat 10 mL/kg up to three times, reassessing after each cycle.",
            ),
        ),
        (
            "response_c",
            StepText::new("Response to expansion", "Clinical and hematocrit response."),
        ),
        (
            "maintenance_c",
            StepText::new(
                "Maintenance hydration",
                "25 mL/kg over 6 hours, then 25 mL/kg over 8 hours if improvement persists.",
            ),
        ),
        (
            "end_group_c",
            StepText::new("Ward admission", "Keep under observation for at least 48 hours."),
        ),
        (
            "group_d",
            StepText::new(
                "Group D",
                "Shock or severe dengue. Resuscitation in an emergency or intensive care bed.",
            ),
        ),
        (
            "resuscitation_d",
            StepText::new(
                "Resuscitation",
                "Isotonic crystalloid 20 mL/kg in 20 minutes, up to three times.",
            ),
        ),
        (
            "reassess_d",
            StepText::new("Hemodynamic reassessment", "Reassess after each expansion cycle."),
        ),
        (
            "bleeding_investigation",
            StepText::new(
                "Bleeding investigation",
                "Falling hematocrit with instability: look for hemorrhage and coagulopathy; \
                 consider red cell transfusion.",
            ),
        ),
        (
            "intensive_care",
            StepText::new("Intensive care", "Transfer to intensive care with continuous monitoring."),
        ),
        (
            "end_group_d",
            StepText::new("Intensive care admission", "Protocol handed over to the intensive care team."),
        ),
        (
            "end",
            StepText::new("Assessment complete", "The classification has been recorded."),
        ),
    ]
}
