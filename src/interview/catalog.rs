// Built-in question catalog

use crate::models::{Area, ExtractionRule, HealthRule, InterviewBlock, Persona, Question};

use InterviewBlock::{Context, DeepDive, Expertise, RiskScan};

/// Options for the revenue band question
pub const REVENUE_BANDS: &[&str] = &["< $1M", "$1M-$5M", "$5M-$20M", "$20M-$100M", "> $100M"];

/// Options for the growth stage question
pub const GROWTH_STAGES: &[&str] = &[
    "Pre-revenue",
    "Early traction",
    "Scaling",
    "Mature",
    "Turnaround",
];

fn text(min_chars: usize) -> ExtractionRule {
    ExtractionRule::Text { min_chars }
}

fn number(min: f64, max: Option<f64>) -> ExtractionRule {
    ExtractionRule::Number {
        min: Some(min),
        max,
    }
}

fn choice(options: &[&str]) -> ExtractionRule {
    ExtractionRule::Choice {
        options: options.iter().map(|o| o.to_string()).collect(),
    }
}

fn lower(good: f64, bad: f64) -> HealthRule {
    HealthRule::LowerIsBetter { good, bad }
}

fn higher(good: f64, bad: f64) -> HealthRule {
    HealthRule::HigherIsBetter { good, bad }
}

/// Single-choice question whose options double as a health scale
fn scored_choice(
    id: &str,
    block: InterviewBlock,
    area: Area,
    text: &str,
    topic: &str,
    scale: &[(&str, u8)],
) -> Question {
    let options: Vec<&str> = scale.iter().map(|(o, _)| *o).collect();
    Question::new(id, block, Some(area), text, id, topic, choice(&options)).with_health(
        HealthRule::ChoiceScores {
            scores: scale.iter().map(|(o, s)| (o.to_string(), *s)).collect(),
        },
    )
}

fn deep(id: &str, area: Area, text: &str, topic: &str, rule: ExtractionRule) -> Question {
    Question::new(id, DeepDive, Some(area), text, id, topic, rule)
}

fn risk(id: &str, area: Area, text: &str, topic: &str, rule: ExtractionRule) -> Question {
    Question::new(id, RiskScan, Some(area), text, id, topic, rule)
}

/// Get the built-in catalog, in traversal order
pub fn builtin_questions() -> Vec<Question> {
    let mut questions = Vec::new();
    questions.extend(context_questions());
    questions.extend(expertise_questions());
    for area in Area::all() {
        questions.extend(deep_dive_questions(*area));
    }
    questions.extend(risk_scan_questions());
    questions
}

fn context_questions() -> Vec<Question> {
    vec![
        Question::new(
            "ctx_company",
            Context,
            None,
            "In a sentence or two, what does your company do and who does it serve?",
            "company_description",
            "business model",
            text(20),
        ),
        Question::new(
            "ctx_industry",
            Context,
            None,
            "Which industry best describes your company?",
            "industry",
            "industry",
            choice(&[
                "SaaS",
                "E-commerce",
                "Professional services",
                "Manufacturing",
                "Healthcare",
                "Financial services",
                "Other",
            ]),
        ),
        Question::new(
            "ctx_team_size",
            Context,
            None,
            "How many people work at the company, including regular contractors?",
            "team_size",
            "team size",
            number(1.0, Some(1_000_000.0)),
        ),
        Question::new(
            "ctx_revenue",
            Context,
            None,
            "What was your revenue over the last twelve months?",
            "revenue_band",
            "revenue",
            choice(REVENUE_BANDS),
        ),
        Question::new(
            "ctx_role",
            Context,
            None,
            "What is your role?",
            crate::models::ROLE_FIELD,
            "respondent role",
            choice(&[
                "Founder/CEO",
                "CTO/Technical lead",
                "Sales lead",
                "Marketing lead",
                "Finance lead",
                "Operations lead",
                "HR/People lead",
                "Other",
            ]),
        ),
        Question::new(
            "ctx_stage",
            Context,
            None,
            "Which stage best describes the business today?",
            "growth_stage",
            "growth stage",
            choice(GROWTH_STAGES),
        ),
        Question::new(
            "ctx_goal",
            Context,
            None,
            "What is the single most important outcome for the business in the next 12 months?",
            "primary_goal",
            "goals",
            text(10),
        ),
    ]
}

fn expertise_questions() -> Vec<Question> {
    vec![
        Question::new(
            "exp_strength",
            Expertise,
            None,
            "Which part of the business do you know best, and how did you get there?",
            "stated_strength",
            "stated expertise",
            text(10),
        ),
        // Persona variants share one field; only one of them is asked
        Question::new(
            "exp_week",
            Expertise,
            None,
            "Walk us through a typical week. Where does most of your time go?",
            "daily_focus",
            "time allocation",
            text(10),
        )
        .for_personas(&[Persona::Founder, Persona::Operator]),
        Question::new(
            "exp_week_technical",
            Expertise,
            None,
            "Which systems, teams or engineering problems take most of your week?",
            "daily_focus",
            "time allocation",
            text(10),
        )
        .for_personas(&[Persona::Technical]),
        Question::new(
            "exp_week_commercial",
            Expertise,
            None,
            "Which accounts, campaigns or deals take most of your week?",
            "daily_focus",
            "time allocation",
            text(10),
        )
        .for_personas(&[Persona::Commercial]),
        Question::new(
            "exp_win",
            Expertise,
            None,
            "Tell us about a recent win you were directly responsible for.",
            "recent_win",
            "recent win",
            text(10),
        ),
        Question::new(
            "exp_metrics",
            Expertise,
            None,
            "Which numbers do you personally check every week?",
            "tracked_metrics",
            "tracked metrics",
            ExtractionRule::List,
        ),
    ]
}

fn deep_dive_questions(area: Area) -> Vec<Question> {
    match area {
        Area::Technology => vec![
            deep(
                "tech_platform_age_years",
                area,
                "How old is your core platform or codebase, in years?",
                "platform age",
                number(0.0, Some(100.0)),
            )
            .with_health(lower(3.0, 12.0)),
            scored_choice(
                "tech_deploy_frequency",
                DeepDive,
                area,
                "How often do you ship changes to production?",
                "delivery cadence",
                &[
                    ("Multiple times a day", 100),
                    ("Weekly", 75),
                    ("Monthly", 40),
                    ("Quarterly or less", 10),
                ],
            ),
            deep(
                "tech_incident_count",
                area,
                "How many customer-facing incidents or outages did you have last quarter?",
                "reliability",
                number(0.0, None),
            )
            .with_health(lower(1.0, 10.0)),
            deep(
                "tech_maintenance_pct",
                area,
                "Roughly what percentage of engineering time goes to maintenance and firefighting?",
                "technical debt",
                ExtractionRule::Percentage,
            )
            .with_health(lower(20.0, 70.0)),
            deep(
                "tech_automation_targets",
                area,
                "Which manual processes would you automate first if you had the budget?",
                "automation",
                text(10),
            )
            .optional(),
        ],
        Area::Sales => vec![
            deep(
                "sales_cycle_days",
                area,
                "How long is your average sales cycle, in days, from first call to signature?",
                "sales cycle",
                number(0.0, Some(1000.0)),
            )
            .with_health(lower(30.0, 180.0)),
            deep(
                "sales_win_rate_pct",
                area,
                "What percentage of qualified opportunities do you win?",
                "win rate",
                ExtractionRule::Percentage,
            )
            .with_health(higher(35.0, 10.0)),
            deep(
                "sales_pipeline_coverage",
                area,
                "How many times your quarterly target does the current pipeline cover (e.g. 3x)?",
                "pipeline coverage",
                number(0.0, Some(50.0)),
            )
            .with_health(higher(3.0, 1.0)),
            scored_choice(
                "sales_forecast_method",
                DeepDive,
                area,
                "How do you forecast revenue?",
                "forecasting",
                &[
                    ("CRM stages with probabilities", 100),
                    ("Spreadsheet roll-up", 60),
                    ("Gut feel", 25),
                    ("No forecast", 0),
                ],
            ),
            deep(
                "sales_biggest_objection",
                area,
                "What is the objection you hear most often from prospects?",
                "objections",
                text(10),
            )
            .optional(),
        ],
        Area::Marketing => vec![
            deep(
                "mkt_cac_payback_months",
                area,
                "How many months does it take to recover the cost of acquiring a customer?",
                "acquisition cost",
                number(0.0, Some(120.0)),
            )
            .with_health(lower(12.0, 36.0)),
            deep(
                "mkt_inbound_share_pct",
                area,
                "What share of new pipeline is marketing-sourced or inbound?",
                "inbound share",
                ExtractionRule::Percentage,
            )
            .with_health(higher(50.0, 10.0)),
            deep(
                "mkt_channels",
                area,
                "Which channels are producing customers today?",
                "channel mix",
                ExtractionRule::MultiChoice {
                    options: [
                        "Paid search",
                        "Paid social",
                        "SEO/content",
                        "Events",
                        "Partnerships",
                        "Outbound",
                        "Referrals",
                    ]
                    .iter()
                    .map(|o| o.to_string())
                    .collect(),
                },
            ),
            scored_choice(
                "mkt_attribution",
                DeepDive,
                area,
                "How do you attribute revenue to marketing activity?",
                "attribution",
                &[
                    ("Multi-touch attribution", 100),
                    ("First or last touch", 65),
                    ("Anecdotal", 25),
                    ("Not at all", 0),
                ],
            ),
            deep(
                "mkt_positioning",
                area,
                "How would your best customer describe you to a peer?",
                "positioning",
                text(10),
            )
            .optional(),
        ],
        Area::Finance => vec![
            deep(
                "fin_gross_margin_pct",
                area,
                "What is your gross margin, as a percentage?",
                "gross margin",
                ExtractionRule::Percentage,
            )
            .with_health(higher(60.0, 20.0)),
            scored_choice(
                "fin_cash_visibility",
                DeepDive,
                area,
                "How often do you look at a forward-looking cash forecast?",
                "cash visibility",
                &[
                    ("Weekly", 100),
                    ("Monthly", 70),
                    ("Quarterly", 35),
                    ("Only when something goes wrong", 5),
                ],
            ),
            deep(
                "fin_dso_days",
                area,
                "On average, how many days does it take customers to pay an invoice?",
                "collections",
                number(0.0, Some(365.0)),
            )
            .with_health(lower(30.0, 90.0)),
            deep(
                "fin_close_days",
                area,
                "How many days does it take to close the books each month?",
                "month-end close",
                number(0.0, Some(90.0)),
            )
            .with_health(lower(5.0, 20.0)),
            deep(
                "fin_pricing_change",
                area,
                "When did you last change pricing, and what happened?",
                "pricing",
                text(10),
            )
            .optional(),
        ],
        Area::Operations => vec![
            deep(
                "ops_on_time_pct",
                area,
                "What percentage of orders or projects are delivered on time?",
                "on-time delivery",
                ExtractionRule::Percentage,
            )
            .with_health(higher(95.0, 70.0)),
            scored_choice(
                "ops_process_documentation",
                DeepDive,
                area,
                "How are your core operating processes captured?",
                "process documentation",
                &[
                    ("Documented and followed", 100),
                    ("Documented, loosely followed", 65),
                    ("Tribal knowledge", 25),
                    ("Nothing written down", 0),
                ],
            ),
            deep(
                "ops_rework_pct",
                area,
                "What share of work has to be redone because of errors?",
                "rework",
                ExtractionRule::Percentage,
            )
            .with_health(lower(5.0, 25.0)),
            deep(
                "ops_single_source_vendors",
                area,
                "How many single-source suppliers could halt delivery if they failed?",
                "supplier risk",
                number(0.0, Some(1000.0)),
            )
            .with_health(lower(0.0, 5.0)),
            deep(
                "ops_bottleneck",
                area,
                "Where does work pile up or wait the longest?",
                "bottlenecks",
                text(10),
            )
            .optional(),
        ],
        Area::People => vec![
            deep(
                "people_turnover_pct",
                area,
                "What was your voluntary staff turnover over the last year, as a percentage?",
                "turnover",
                ExtractionRule::Percentage,
            )
            .with_health(lower(10.0, 35.0)),
            deep(
                "people_time_to_hire_days",
                area,
                "How many days does it usually take to fill an open role?",
                "hiring speed",
                number(0.0, Some(365.0)),
            )
            .with_health(lower(30.0, 90.0)),
            scored_choice(
                "people_review_cadence",
                DeepDive,
                area,
                "How often do people get structured feedback on their performance?",
                "performance reviews",
                &[
                    ("Quarterly or more", 100),
                    ("Twice a year", 80),
                    ("Annually", 50),
                    ("Never", 0),
                ],
            ),
            deep(
                "people_engagement_score",
                area,
                "On a scale of 0 to 10, how would your team rate working here?",
                "engagement",
                number(0.0, Some(10.0)),
            )
            .with_health(higher(8.0, 4.0)),
            deep(
                "people_key_gap",
                area,
                "Which capability is the team most missing today?",
                "capability gaps",
                text(10),
            )
            .optional(),
        ],
        Area::Strategy => vec![
            deep(
                "strat_plan_horizon_months",
                area,
                "How far ahead does your written plan go, in months?",
                "planning horizon",
                number(0.0, Some(240.0)),
            )
            .with_health(higher(12.0, 3.0)),
            scored_choice(
                "strat_goal_cadence",
                DeepDive,
                area,
                "How are company goals set and tracked?",
                "goal setting",
                &[
                    ("Quarterly OKRs or equivalent", 100),
                    ("Annual goals only", 60),
                    ("Informally", 25),
                    ("No formal goals", 0),
                ],
            ),
            deep(
                "strat_initiative_count",
                area,
                "How many strategic initiatives are running in parallel right now?",
                "focus",
                number(0.0, Some(100.0)),
            )
            .with_health(lower(3.0, 10.0)),
            scored_choice(
                "strat_competitor_review",
                DeepDive,
                area,
                "How often do you review what competitors are doing?",
                "competitive awareness",
                &[
                    ("Monthly", 100),
                    ("Quarterly", 75),
                    ("Yearly", 40),
                    ("Never", 0),
                ],
            ),
            deep(
                "strat_differentiator",
                area,
                "What would a competitor find hardest to copy about you?",
                "differentiation",
                text(10),
            )
            .optional(),
        ],
    }
}

fn risk_scan_questions() -> Vec<Question> {
    vec![
        risk(
            "risk_tech_bus_factor_weeks",
            Area::Technology,
            "If your most senior engineer left tomorrow, how many weeks would it take to recover full delivery speed?",
            "key-person dependency",
            number(0.0, Some(520.0)),
        )
        .with_health(lower(4.0, 26.0)),
        risk(
            "risk_sales_concentration_pct",
            Area::Sales,
            "What percentage of revenue comes from your three largest customers?",
            "customer concentration",
            ExtractionRule::Percentage,
        )
        .with_health(lower(20.0, 60.0)),
        risk(
            "risk_marketing_channel_pct",
            Area::Marketing,
            "What share of new leads comes from your single largest channel?",
            "channel dependency",
            ExtractionRule::Percentage,
        )
        .with_health(lower(40.0, 85.0)),
        risk(
            "risk_finance_runway_months",
            Area::Finance,
            "How many months of runway do you have at the current burn rate?",
            "runway",
            number(0.0, Some(600.0)),
        )
        .with_health(higher(18.0, 6.0)),
        scored_choice(
            "risk_ops_continuity",
            RiskScan,
            Area::Operations,
            "If a key operator were out for a month, how would critical processes run?",
            "operational continuity",
            &[
                ("Smoothly", 100),
                ("With some disruption", 60),
                ("Badly", 25),
                ("They would stop", 0),
            ],
        ),
        risk(
            "risk_people_flight_pct",
            Area::People,
            "What percentage of your key people would you worry about losing in the next 12 months?",
            "retention risk",
            ExtractionRule::Percentage,
        )
        .with_health(lower(10.0, 40.0)),
        scored_choice(
            "risk_strategy_review",
            RiskScan,
            Area::Strategy,
            "When did leadership last formally revisit the strategy?",
            "strategy review",
            &[
                ("In the last quarter", 100),
                ("In the last year", 70),
                ("More than a year ago", 30),
                ("Never", 0),
            ],
        ),
    ]
}
