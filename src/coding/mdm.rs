use serde::{Deserialize, Serialize};

/// Complexity of medical decision making, ordered lowest to highest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MdmLevel {
    Straightforward,
    Low,
    Moderate,
    High,
}

impl std::fmt::Display for MdmLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MdmLevel::Straightforward => "Straightforward",
            MdmLevel::Low => "Low",
            MdmLevel::Moderate => "Moderate",
            MdmLevel::High => "High",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for MdmLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "straightforward" | "minimal" => Ok(MdmLevel::Straightforward),
            "low" => Ok(MdmLevel::Low),
            "moderate" => Ok(MdmLevel::Moderate),
            "high" => Ok(MdmLevel::High),
            other => Err(format!("unknown MDM level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MdmElement {
    Problems,
    Data,
    Risk,
}

/// Clinical facts of one encounter that drive the complexity score.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncounterFacts {
    pub diagnosis_count: u32,
    pub has_chronic_illness: bool,
    pub has_severe_chronic_illness: bool,
    pub lab_order_count: u32,
    pub imaging_order_count: u32,
    pub independent_interpretation: bool,
    pub external_discussion: bool,
    pub prescription_count: u32,
    pub controlled_substance: bool,
    pub procedure_performed: bool,
    pub emergency_risk: bool,
    pub positive_ros_count: u32,
    pub encounter_type: String,
}

/// One element's level plus why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementScore {
    pub element: MdmElement,
    pub level: MdmLevel,
    /// Only the data element is point-based.
    pub points: Option<u32>,
    pub rationale: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MdmAssessment {
    pub problems: ElementScore,
    pub data: ElementScore,
    pub risk: ElementScore,
    pub level: MdmLevel,
    pub summary: String,
}

impl MdmAssessment {
    pub fn elements(&self) -> [&ElementScore; 3] {
        [&self.problems, &self.data, &self.risk]
    }
}

pub fn score_problems(facts: &EncounterFacts) -> ElementScore {
    let mut rationale = Vec::new();

    let level = if facts.has_severe_chronic_illness || facts.diagnosis_count >= 3 {
        if facts.has_severe_chronic_illness {
            rationale.push("Chronic illness with severe exacerbation or progression".to_string());
        }
        if facts.diagnosis_count >= 3 {
            rationale.push(format!("{} problems addressed", facts.diagnosis_count));
        }
        MdmLevel::High
    } else if facts.has_chronic_illness || facts.diagnosis_count >= 2 {
        if facts.has_chronic_illness {
            rationale.push("Chronic illness addressed".to_string());
        }
        if facts.diagnosis_count >= 2 {
            rationale.push(format!("{} problems addressed", facts.diagnosis_count));
        }
        MdmLevel::Moderate
    } else if facts.diagnosis_count >= 1 {
        rationale.push("1 problem addressed".to_string());
        MdmLevel::Low
    } else {
        rationale.push("No problems documented".to_string());
        MdmLevel::Straightforward
    };

    ElementScore {
        element: MdmElement::Problems,
        level,
        points: None,
        rationale,
    }
}

pub fn score_data(facts: &EncounterFacts) -> ElementScore {
    let mut rationale = Vec::new();
    let mut points = 0u32;

    if facts.lab_order_count > 0 {
        points += 1;
        rationale.push(format!("{} lab order(s) reviewed (+1)", facts.lab_order_count));
    }
    if facts.imaging_order_count > 0 {
        points += 1;
        rationale.push(format!(
            "{} imaging order(s) reviewed (+1)",
            facts.imaging_order_count
        ));
    }
    if facts.independent_interpretation {
        points += 2;
        rationale.push("Independent interpretation of tests (+2)".to_string());
    }
    if facts.external_discussion {
        points += 1;
        rationale.push("Discussion with external provider (+1)".to_string());
    }

    let total_tests = facts.lab_order_count + facts.imaging_order_count;

    let level = if points >= 3 || facts.independent_interpretation {
        MdmLevel::High
    } else if points == 2 || total_tests >= 3 {
        MdmLevel::Moderate
    } else if points == 1 || total_tests >= 1 {
        MdmLevel::Low
    } else {
        rationale.push("No data reviewed".to_string());
        MdmLevel::Straightforward
    };

    ElementScore {
        element: MdmElement::Data,
        level,
        points: Some(points),
        rationale,
    }
}

pub fn score_risk(facts: &EncounterFacts) -> ElementScore {
    let mut rationale = Vec::new();

    let level = if facts.emergency_risk || facts.procedure_performed || facts.controlled_substance {
        if facts.emergency_risk {
            rationale.push("Decision regarding emergency care".to_string());
        }
        if facts.procedure_performed {
            rationale.push("Procedure performed".to_string());
        }
        if facts.controlled_substance {
            rationale.push("Controlled substance prescribed".to_string());
        }
        MdmLevel::High
    } else if facts.prescription_count > 0 {
        rationale.push(format!(
            "Prescription drug management ({} prescription(s))",
            facts.prescription_count
        ));
        MdmLevel::Moderate
    } else if facts.positive_ros_count >= 2 {
        rationale.push(format!(
            "{} positive review-of-systems findings",
            facts.positive_ros_count
        ));
        MdmLevel::Low
    } else {
        rationale.push("Minimal risk of morbidity".to_string());
        MdmLevel::Straightforward
    };

    ElementScore {
        element: MdmElement::Risk,
        level,
        points: None,
        rationale,
    }
}

/// Combine three element levels with the 2-of-3 rule.
///
/// High wins with two Highs or with one High backed by a Moderate; otherwise
/// a level needs two elements at exactly that level. Anything else is
/// Straightforward.
pub fn overall_level(levels: [MdmLevel; 3]) -> MdmLevel {
    let count = |target: MdmLevel| levels.iter().filter(|&&l| l == target).count();

    let high = count(MdmLevel::High);
    let moderate = count(MdmLevel::Moderate);
    let low = count(MdmLevel::Low);

    if high >= 2 || (high >= 1 && moderate >= 1) {
        MdmLevel::High
    } else if moderate >= 2 {
        MdmLevel::Moderate
    } else if low >= 2 {
        MdmLevel::Low
    } else {
        MdmLevel::Straightforward
    }
}

pub fn assess(facts: &EncounterFacts) -> MdmAssessment {
    let problems = score_problems(facts);
    let data = score_data(facts);
    let risk = score_risk(facts);

    let level = overall_level([problems.level, data.level, risk.level]);
    let summary = format!(
        "MDM {}: problems {}, data {}, risk {}",
        level, problems.level, data.level, risk.level
    );

    MdmAssessment {
        problems,
        data,
        risk,
        level,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MdmLevel::*;

    fn facts() -> EncounterFacts {
        EncounterFacts {
            encounter_type: "Established Patient".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_problems_thresholds() {
        let mut f = facts();
        assert_eq!(score_problems(&f).level, Straightforward);
        f.diagnosis_count = 1;
        assert_eq!(score_problems(&f).level, Low);
        f.diagnosis_count = 2;
        assert_eq!(score_problems(&f).level, Moderate);
        f.diagnosis_count = 3;
        assert_eq!(score_problems(&f).level, High);

        let chronic = EncounterFacts { has_chronic_illness: true, ..facts() };
        assert_eq!(score_problems(&chronic).level, Moderate);
        let severe = EncounterFacts { has_severe_chronic_illness: true, ..facts() };
        assert_eq!(score_problems(&severe).level, High);
    }

    #[test]
    fn test_data_points() {
        let lab_and_imaging = EncounterFacts {
            lab_order_count: 1,
            imaging_order_count: 1,
            ..facts()
        };
        let score = score_data(&lab_and_imaging);
        assert_eq!(score.points, Some(2));
        assert_eq!(score.level, Moderate);

        let three_labs = EncounterFacts { lab_order_count: 3, ..facts() };
        let score = score_data(&three_labs);
        assert_eq!(score.points, Some(1));
        assert_eq!(score.level, Moderate);

        let one_lab = EncounterFacts { lab_order_count: 1, ..facts() };
        assert_eq!(score_data(&one_lab).level, Low);

        let interpretation = EncounterFacts { independent_interpretation: true, ..facts() };
        let score = score_data(&interpretation);
        assert_eq!(score.points, Some(2));
        assert_eq!(score.level, High);

        let all = EncounterFacts {
            lab_order_count: 1,
            imaging_order_count: 1,
            external_discussion: true,
            ..facts()
        };
        assert_eq!(score_data(&all).points, Some(3));
        assert_eq!(score_data(&all).level, High);

        assert_eq!(score_data(&facts()).level, Straightforward);
    }

    #[test]
    fn test_risk_levels() {
        let controlled = EncounterFacts { controlled_substance: true, ..facts() };
        assert_eq!(score_risk(&controlled).level, High);
        let procedure = EncounterFacts { procedure_performed: true, ..facts() };
        assert_eq!(score_risk(&procedure).level, High);
        let rx = EncounterFacts { prescription_count: 1, ..facts() };
        assert_eq!(score_risk(&rx).level, Moderate);
        let ros = EncounterFacts { positive_ros_count: 2, ..facts() };
        assert_eq!(score_risk(&ros).level, Low);
        let one_ros = EncounterFacts { positive_ros_count: 1, ..facts() };
        assert_eq!(score_risk(&one_ros).level, Straightforward);
    }

    #[test]
    fn test_overall_two_of_three() {
        assert_eq!(overall_level([High, High, Straightforward]), High);
        assert_eq!(overall_level([High, Moderate, Straightforward]), High);
        assert_eq!(overall_level([Moderate, Moderate, Low]), Moderate);
        assert_eq!(overall_level([Low, Low, High]), Low);
        assert_eq!(overall_level([Moderate, Low, Straightforward]), Straightforward);
        // a lone High without a Moderate does not carry the visit
        assert_eq!(overall_level([High, Low, Straightforward]), Straightforward);
        assert_eq!(overall_level([Low, Straightforward, Straightforward]), Straightforward);
    }

    #[test]
    fn test_assessment_keeps_rationale() {
        let f = EncounterFacts {
            diagnosis_count: 2,
            prescription_count: 1,
            lab_order_count: 1,
            ..facts()
        };
        let assessment = assess(&f);
        assert_eq!(assessment.level, Moderate);
        assert_eq!(assessment.problems.rationale, vec!["2 problems addressed"]);
        assert_eq!(assessment.data.points, Some(1));
        assert!(assessment.risk.rationale[0].contains("Prescription"));
        assert_eq!(
            assessment.summary,
            "MDM Moderate: problems Moderate, data Low, risk Moderate"
        );
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("Moderate".parse::<MdmLevel>().unwrap(), Moderate);
        assert_eq!(" high ".parse::<MdmLevel>().unwrap(), High);
        assert!("extreme".parse::<MdmLevel>().is_err());
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_facts() -> impl Strategy<Value = EncounterFacts> {
        (
            (0u32..6, any::<bool>(), any::<bool>(), 0u32..5, 0u32..5),
            (any::<bool>(), any::<bool>(), 0u32..4, any::<bool>()),
            (any::<bool>(), any::<bool>(), 0u32..6),
        )
            .prop_map(
                |(
                    (diagnosis_count, chronic, severe, labs, imaging),
                    (interpretation, discussion, prescriptions, controlled),
                    (procedure, emergency, ros),
                )| EncounterFacts {
                    diagnosis_count,
                    has_chronic_illness: chronic,
                    has_severe_chronic_illness: severe,
                    lab_order_count: labs,
                    imaging_order_count: imaging,
                    independent_interpretation: interpretation,
                    external_discussion: discussion,
                    prescription_count: prescriptions,
                    controlled_substance: controlled,
                    procedure_performed: procedure,
                    emergency_risk: emergency,
                    positive_ros_count: ros,
                    encounter_type: "Established Patient".to_string(),
                },
            )
    }

    fn arb_level() -> impl Strategy<Value = MdmLevel> {
        prop_oneof![
            Just(MdmLevel::Straightforward),
            Just(MdmLevel::Low),
            Just(MdmLevel::Moderate),
            Just(MdmLevel::High),
        ]
    }

    proptest! {
        /// Three or more diagnoses, or a severe chronic illness, always make problems High
        #[test]
        fn problems_high_for_complex_encounters(mut facts in arb_facts(), extra in 3u32..10) {
            let mut by_count = facts.clone();
            by_count.diagnosis_count = extra;
            prop_assert_eq!(score_problems(&by_count).level, MdmLevel::High);

            facts.has_severe_chronic_illness = true;
            prop_assert_eq!(score_problems(&facts).level, MdmLevel::High);
        }

        /// The combined level never exceeds the strongest element
        #[test]
        fn overall_never_exceeds_max_element(levels in [arb_level(), arb_level(), arb_level()]) {
            let overall = overall_level(levels);
            let max = levels.iter().copied().max().unwrap();
            prop_assert!(overall <= max, "{:?} -> {} above {}", levels, overall, max);
        }

        /// Two High elements always make the visit High
        #[test]
        fn two_highs_make_high(levels in [arb_level(), arb_level(), arb_level()]) {
            let highs = levels.iter().filter(|&&l| l == MdmLevel::High).count();
            if highs >= 2 {
                prop_assert_eq!(overall_level(levels), MdmLevel::High);
            }
        }

        #[test]
        fn assessment_matches_element_combination(facts in arb_facts()) {
            let assessment = assess(&facts);
            let expected = overall_level([
                assessment.problems.level,
                assessment.data.level,
                assessment.risk.level,
            ]);
            prop_assert_eq!(assessment.level, expected);
        }
    }
}
