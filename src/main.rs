mod config;
mod error;
mod extract;
mod limits;
mod quiz;
mod score;

use std::path::Path;
use std::sync::Arc;

use dotenv::dotenv;
use log::{debug, info, warn};
use quiz::engine::{BatchResult, QuizEngine};
use quiz::polls::{self, Continuation};
use quiz::Question;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempPath;
use teloxide::{
    net::Download,
    prelude::*,
    types::{
        ChatId, Document, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
        KeyboardMarkup, KeyboardRemove, PollAnswer, PollType, UserId,
    },
    utils::command::BotCommands,
};

use config::Config;
use error::QuizError;
use extract::{DocumentExtractor, TextExtractor};
use limits::UploadLimiter;
use score::InMemoryScores;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
enum Command {
    #[command(description = "show the welcome message.")]
    Start,
    #[command(description = "display this text.")]
    Help,
    #[command(description = "drop the current document and quiz.")]
    Cancel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env is fine; the variables may come from the real environment.
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let config = Config::from_env()?;
    let bot = Bot::new(&config.bot_token);

    let engine = Arc::new(QuizEngine::new(
        Arc::new(UploadLimiter::from_config(&config)),
        Arc::new(InMemoryScores::default()),
        StdRng::from_entropy(),
    ));
    let extractor: Arc<dyn TextExtractor> = Arc::new(DocumentExtractor);
    let config = Arc::new(config);

    bot.set_my_commands(Command::bot_commands()).await?;

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.document().is_some())
                        .endpoint(receive_document),
                )
                .branch(
                    dptree::filter(|msg: Message| {
                        msg.text().map_or(false, |text| !text.starts_with('/'))
                    })
                    .endpoint(receive_question_count),
                ),
        )
        .branch(Update::filter_callback_query().endpoint(receive_continuation))
        .branch(Update::filter_poll_answer().endpoint(receive_poll_answer));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine, extractor, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn welcome_text(config: &Config) -> String {
    format!(
        "👋 Welcome to the Quiz Bot!\n\n\
         📄 Send me a PDF or PPT/PPTX file.\n\
         📌 I will generate quiz questions for you from its content.\n\
         📬 You can upload up to {} files per hour or {} files per 24 hours.\n\
         ✅ Let's get started!",
        config.uploads_per_hour, config.uploads_per_day
    )
}

fn rejection_text(err: &QuizError) -> &'static str {
    match err {
        QuizError::RateLimitExceeded => "🚫 Upload limit reached. Try again later.",
        QuizError::ExtractionInsufficient => "❌ Not enough content found.",
        QuizError::InvalidInput(_) => "⚠️ Invalid number.",
        QuizError::NoActiveSession => "📄 Send me a document first.",
    }
}

async fn command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    engine: Arc<QuizEngine>,
    config: Arc<Config>,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, welcome_text(&config)).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::Cancel => {
            let user = msg.from().map(|u| u.id);
            let text = if user.map_or(false, |user| engine.end_session(user)) {
                "🗑 Quiz cancelled. Send a new file whenever you like."
            } else {
                "Nothing to cancel."
            };
            bot.send_message(msg.chat.id, text)
                .reply_markup(KeyboardRemove::new())
                .await?;
        }
    }
    Ok(())
}

async fn receive_document(
    bot: Bot,
    msg: Message,
    engine: Arc<QuizEngine>,
    extractor: Arc<dyn TextExtractor>,
    config: Arc<Config>,
) -> HandlerResult {
    let (Some(user), Some(document)) = (msg.from().map(|u| u.id), msg.document()) else {
        return Ok(());
    };

    if let Err(err) = engine.check_upload(user) {
        bot.send_message(msg.chat.id, rejection_text(&err)).await?;
        return Ok(());
    }

    let status = bot.send_message(msg.chat.id, "📥 Downloading file...").await?;
    let upload = download_document(&bot, document, &config.download_dir).await?;
    bot.edit_message_text(msg.chat.id, status.id, "🔍 Extracting content...")
        .await?;

    // Extraction failures take the same path as a document with no text.
    let text = extract::read_and_discard(extractor, upload).await;

    match engine.begin_session(user, text) {
        Ok(choices) => {
            bot.edit_message_text(msg.chat.id, status.id, "✅ Extracted successfully.")
                .await?;
            let keyboard = KeyboardMarkup::new(vec![choices
                .iter()
                .map(|n| KeyboardButton::new(n.to_string()))
                .collect::<Vec<_>>()])
            .one_time_keyboard(true)
            .resize_keyboard(true);
            bot.send_message(msg.chat.id, "Choose number of questions:")
                .reply_markup(keyboard)
                .await?;
        }
        Err(err) => {
            bot.edit_message_text(msg.chat.id, status.id, rejection_text(&err))
                .await?;
        }
    }
    Ok(())
}

async fn download_document(
    bot: &Bot,
    document: &Document,
    dir: &Path,
) -> Result<TempPath, Box<dyn std::error::Error + Send + Sync>> {
    let file = bot.get_file(document.file.id.clone()).await?;

    // The extractor picks its reader by extension, so keep the uploaded one.
    let extension = document
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");
    // Dropping the path deletes the file, so a failed download leaves nothing behind.
    let path = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)?
        .into_temp_path();

    let mut destination = tokio::fs::File::create(&path).await?;
    bot.download_file(&file.path, &mut destination).await?;
    Ok(path)
}

async fn receive_question_count(bot: Bot, msg: Message, engine: Arc<QuizEngine>) -> HandlerResult {
    let (Some(user), Some(text)) = (msg.from().map(|u| u.id), msg.text()) else {
        return Ok(());
    };

    match engine.set_question_count(user, text) {
        Ok(_) => {
            bot.send_message(msg.chat.id, "🧠 Generating questions...")
                .reply_markup(KeyboardRemove::new())
                .await?;
            deliver_next_batch(&bot, msg.chat.id, user, &engine).await
        }
        // Free text outside of a session is just chatter.
        Err(QuizError::NoActiveSession) => Ok(()),
        Err(err) => {
            bot.send_message(msg.chat.id, rejection_text(&err)).await?;
            Ok(())
        }
    }
}

async fn deliver_next_batch(
    bot: &Bot,
    chat_id: ChatId,
    user: UserId,
    engine: &QuizEngine,
) -> HandlerResult {
    let (questions, has_more) = match engine.next_batch(user) {
        Ok(BatchResult::Delivered {
            questions,
            has_more,
        }) => (questions, has_more),
        Ok(BatchResult::SessionComplete(report)) => {
            bot.send_message(
                chat_id,
                format!("🎉 Done! You got {}/{} correct.", report.score, report.total),
            )
            .await?;
            return Ok(());
        }
        Err(err) => {
            debug!("No batch for user {}: {}", user.0, err);
            return Ok(());
        }
    };

    // The cursor has already moved; a poll that fails to send is not retried.
    for question in &questions {
        let poll_id = send_quiz_poll(bot, chat_id, question).await?;
        match poll_id {
            Some(poll_id) => engine.record_poll(poll_id, user, question.correct_index),
            None => warn!("Sent poll for user {} came back without a poll", user.0),
        }
    }

    let continuation = Continuation::after_batch(has_more);
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        continuation.button_label(),
        continuation.callback_data(),
    )]]);
    bot.send_message(chat_id, continuation.prompt())
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn send_quiz_poll(
    bot: &Bot,
    chat_id: ChatId,
    question: &Question,
) -> Result<Option<String>, teloxide::RequestError> {
    let sent = bot
        .send_poll(
            chat_id,
            polls::poll_question_text(&question.text),
            question.options.iter().cloned(),
        )
        .type_(PollType::Quiz)
        .correct_option_id(question.correct_index)
        .is_anonymous(false)
        .await?;
    Ok(sent.poll().map(|poll| poll.id.clone()))
}

async fn receive_continuation(bot: Bot, q: CallbackQuery, engine: Arc<QuizEngine>) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let user = q.from.id;

    match q.data.as_deref().and_then(Continuation::from_callback_data) {
        Some(Continuation::NextBatch) => {
            deliver_next_batch(&bot, message.chat.id, user, &engine).await?;
        }
        Some(Continuation::FinishQuiz) => match engine.finish(user) {
            Ok(report) => {
                bot.edit_message_text(
                    message.chat.id,
                    message.id,
                    format!("✅ You got {}/{} correct.", report.score, report.total),
                )
                .await?;
            }
            Err(err) => debug!("Finish ignored for user {}: {}", user.0, err),
        },
        None => debug!("Unknown callback data {:?}", q.data),
    }
    Ok(())
}

async fn receive_poll_answer(answer: PollAnswer, engine: Arc<QuizEngine>) -> HandlerResult {
    let chosen = answer
        .option_ids
        .iter()
        .filter_map(|&id| u8::try_from(id).ok())
        .collect::<Vec<u8>>();

    match engine.on_answer_event(&answer.poll_id, &chosen) {
        Some(outcome) => info!(
            "User {} answered poll {} ({})",
            outcome.user.0,
            answer.poll_id,
            if outcome.is_correct { "correct" } else { "wrong" }
        ),
        None => debug!("Ignoring answer to unknown poll {}", answer.poll_id),
    }
    Ok(())
}
