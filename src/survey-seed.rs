//! A CLI tool that fills a survey database with sample campaigns.
//! Everything is written through the same collections and transactional
//! response path the server uses.

use chrono::{Duration, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{error, info, warn};
use mongodb::{error::Error as DbError, Client, Database};
use rand::{seq::SliceRandom, Rng};
use thiserror::Error;

use survey_backend::model::{
    db::{
        Answer, AnswerCore, Campaign, CampaignCore, NewResponse, NewResponseAnswer, Question,
        QuestionCore, QuestionType,
    },
    mongodb::{ensure_indexes_exist, Coll, Id},
    store::{MongoStore, SurveyStore},
};

const PROGRAM_NAME: &str = "survey-seed";

const ABOUT_TEXT: &str = "Seed a survey database with sample campaigns.

The sample covers an active campaign, a future campaign, an expired campaign,
a disabled campaign, and an active campaign holding one question of each type.";

const DB_URI: &str = "DB_URI";
const DB_URI_HELP: &str = "MongoDB connection string; must point at a replica set";

const DB_NAME: &str = "DB_NAME";
const DB_NAME_HELP: &str = "Name of the database to seed";

const RESPONSES: &str = "RESPONSES";
const RESPONSES_HELP: &str = "Also record random responses from `someuserN` users";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DB_URI)
                .help(DB_URI_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(DB_NAME)
                .long("db-name")
                .help(DB_NAME_HELP)
                .action(ArgAction::Set)
                .default_value("survey"),
        )
        .arg(
            Arg::new(RESPONSES)
                .long("responses")
                .help(RESPONSES_HELP)
                .action(ArgAction::SetTrue),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error(transparent)]
    Survey(#[from] survey_backend::error::Error),
}

/// Inserts campaigns, questions and answers, handing back the new IDs.
struct Seeder {
    campaigns: Coll<Campaign>,
    questions: Coll<Question>,
    answers: Coll<Answer>,
}

impl Seeder {
    fn new(db: &Database) -> Self {
        Self {
            campaigns: Coll::from_db(db),
            questions: Coll::from_db(db),
            answers: Coll::from_db(db),
        }
    }

    async fn campaign(
        &self,
        name: &str,
        start: Duration,
        end: Duration,
        enabled: bool,
    ) -> Result<Id, Error> {
        let now = Utc::now();
        let campaign = Campaign {
            id: Id::new(),
            campaign: CampaignCore {
                name: name.to_string(),
                start_date: now + start,
                end_date: now + end,
                enabled,
            },
        };
        self.campaigns.insert_one(&campaign, None).await?;
        info!("Seeded campaign \"{name}\"");
        Ok(campaign.id)
    }

    async fn question(
        &self,
        campaign_id: Id,
        text: &str,
        question_type: QuestionType,
        enabled: bool,
    ) -> Result<Id, Error> {
        let question = Question {
            id: Id::new(),
            question: QuestionCore {
                campaign_id,
                text: text.to_string(),
                question_type,
                enabled,
            },
        };
        self.questions.insert_one(&question, None).await?;
        Ok(question.id)
    }

    /// Insert the given `(text, enabled)` answers, returning the IDs of the
    /// enabled ones.
    async fn answers(&self, question_id: Id, answers: &[(&str, bool)]) -> Result<Vec<Id>, Error> {
        let answers = answers
            .iter()
            .map(|(text, enabled)| Answer {
                id: Id::new(),
                answer: AnswerCore {
                    question_id,
                    text: text.to_string(),
                    enabled: *enabled,
                },
            })
            .collect::<Vec<_>>();
        self.answers.insert_many(&answers, None).await?;
        Ok(answers
            .iter()
            .filter(|a| a.enabled)
            .map(|a| a.id)
            .collect())
    }
}

/// A choice question and the answers random responses may pick from.
struct Choices {
    question_id: Id,
    answer_ids: Vec<Id>,
}

/// Insert the sample data, returning the questions open to random responses.
async fn seed_campaigns(seeder: &Seeder) -> Result<Vec<Choices>, Error> {
    let mut choices = Vec::new();

    let campaign = seeder
        .campaign(
            "Determine Feature Priority",
            Duration::zero(),
            Duration::hours(72),
            true,
        )
        .await?;
    let question_id = seeder
        .question(
            campaign,
            "What is the next feature you would like to see implemented?",
            QuestionType::Single,
            true,
        )
        .await?;
    let answer_ids = seeder
        .answers(
            question_id,
            &[
                ("container service", true),
                ("standalone databases", true),
                ("serverless computing", true),
            ],
        )
        .await?;
    choices.push(Choices {
        question_id,
        answer_ids,
    });

    let campaign = seeder
        .campaign(
            "Favorite Feature",
            Duration::hours(72),
            Duration::hours(144),
            true,
        )
        .await?;
    let question_id = seeder
        .question(
            campaign,
            "What is your favorite current feature?",
            QuestionType::Single,
            true,
        )
        .await?;
    let answer_ids = seeder
        .answers(
            question_id,
            &[
                ("servers for regulated data", true),
                ("tryit", true),
                ("windows servers", true),
                ("external requests", true),
            ],
        )
        .await?;
    choices.push(Choices {
        question_id,
        answer_ids,
    });

    let campaign = seeder
        .campaign(
            "Favorite Developer",
            Duration::hours(-72),
            Duration::zero(),
            true,
        )
        .await?;
    let question_id = seeder
        .question(
            campaign,
            "Who is your favorite developer?",
            QuestionType::Single,
            true,
        )
        .await?;
    let answer_ids = seeder
        .answers(
            question_id,
            &[
                ("Camden", true),
                ("Tenyo", true),
                ("Galen", true),
                ("Andrew", true),
            ],
        )
        .await?;
    choices.push(Choices {
        question_id,
        answer_ids,
    });

    let campaign = seeder
        .campaign(
            "Disabled Campaign",
            Duration::hours(-72),
            Duration::zero(),
            false,
        )
        .await?;
    let question_id = seeder
        .question(
            campaign,
            "How do you feel about disabled campaigns?",
            QuestionType::Single,
            true,
        )
        .await?;
    seeder
        .answers(question_id, &[("Good", true), ("Bad", true), ("Meh", true)])
        .await?;

    let campaign = seeder
        .campaign(
            "Multi Question",
            Duration::zero(),
            Duration::hours(36),
            true,
        )
        .await?;
    let question_id = seeder
        .question(
            campaign,
            "How do you feel about too many questions?",
            QuestionType::Single,
            true,
        )
        .await?;
    seeder
        .answers(question_id, &[("Good", true), ("Bad", true), ("Meh", true)])
        .await?;
    let question_id = seeder
        .question(
            campaign,
            "How do you feel about multiple choice questions?",
            QuestionType::Multi,
            true,
        )
        .await?;
    seeder
        .answers(
            question_id,
            &[
                ("Good", true),
                ("Bad", true),
                ("Other", true),
                ("Supercalifragilisticexpialidocious", false),
            ],
        )
        .await?;
    seeder
        .question(
            campaign,
            "How do you feel about disabled free form questions?",
            QuestionType::Input,
            false,
        )
        .await?;
    seeder
        .question(
            campaign,
            "How do you feel about enabled free form questions?",
            QuestionType::Input,
            true,
        )
        .await?;

    Ok(choices)
}

/// Record up to 100 random single-answer responses to the given question.
///
/// Users are drawn at random, so some of them repeat; those responses are
/// rejected by the store exactly as a real duplicate would be, and skipped.
async fn seed_responses(store: &MongoStore, choices: &Choices) -> Result<usize, Error> {
    let picks = {
        let mut rng = rand::thread_rng();
        let times = rng.gen_range(0..100);
        (0..=times)
            .filter_map(|_| {
                let user_id = format!("someuser{}", rng.gen_range(0..100));
                choices
                    .answer_ids
                    .choose(&mut rng)
                    .map(|answer_id| (user_id, *answer_id))
            })
            .collect::<Vec<_>>()
    };

    let mut recorded = 0;
    for (user_id, answer_id) in picks {
        let mut tx = store.begin().await?;
        let response = match tx
            .insert_response(&NewResponse::new(
                choices.question_id,
                user_id,
                String::new(),
            ))
            .await
        {
            Ok(response) => response,
            Err(survey_backend::error::Error::Conflict(_)) => {
                tx.abort().await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        tx.insert_response_answers(&[NewResponseAnswer {
            response_id: response.id,
            answer_id,
            question_id: choices.question_id,
        }])
        .await?;
        tx.commit().await?;
        recorded += 1;
    }
    Ok(recorded)
}

async fn run(args: &ArgMatches) -> Result<(), Error> {
    let db_uri = args
        .get_one::<String>(DB_URI)
        .expect("DB_URI is a required argument");
    let db_name = args
        .get_one::<String>(DB_NAME)
        .expect("DB_NAME has a default value");

    let client = Client::with_uri_str(db_uri).await?;
    let db = client.database(db_name);
    ensure_indexes_exist(&db).await?;

    let choices = seed_campaigns(&Seeder::new(&db)).await?;
    info!("Seeded campaigns");

    if args.get_flag(RESPONSES) {
        let store = MongoStore::new(client, &db);
        for question in &choices {
            let count = seed_responses(&store, question).await?;
            info!("Seeded {count} responses to question {}", question.question_id);
        }
    }
    Ok(())
}

#[rocket::main]
async fn main() {
    // Set up logging.
    log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers())
        .expect("Failed to initialise logging");

    let args = cli().get_matches();
    if let Err(err) = run(&args).await {
        error!("{err}");
        warn!("The database may be partially seeded");
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn responses_flag_is_optional() {
        let args = cli()
            .try_get_matches_from([PROGRAM_NAME, "mongodb://localhost:27017/?replicaSet=rs0"])
            .unwrap();
        assert!(!args.get_flag(RESPONSES));
        assert_eq!(args.get_one::<String>(DB_NAME).unwrap(), "survey");

        let args = cli()
            .try_get_matches_from([PROGRAM_NAME, "mongodb://localhost", "--responses"])
            .unwrap();
        assert!(args.get_flag(RESPONSES));
    }
}
