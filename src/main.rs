use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use mailsorter::config::Config;
use mailsorter::email::truncate_chars;
use mailsorter::email_processor::EmailProcessor;
use mailsorter::store::{export_csv, CategoryFilter, ResultStore, StoredRun};

#[derive(Parser)]
#[command(name = "mailsorter")]
#[command(about = "Classe les emails Gmail récents par catégorie à l'aide d'un modèle de langage")]
#[command(version)]
struct Args {
    /// Mode dry-run : classe et affiche sans sauvegarder ni notifier
    #[arg(short, long)]
    dry_run: bool,

    /// Mode daemon : lance le programme en mode daemon avec scheduling
    #[arg(long)]
    daemon: bool,

    /// Répertoire des résultats (par défaut: DATA_DIR ou ./data)
    #[arg(short = 'o', long)]
    data_dir: Option<String>,

    /// Nombre d'emails récents à classer (par défaut: GMAIL_MAX_RESULTS ou 15)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Classer les emails d'un fichier JSON au lieu de Gmail
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// N'afficher que les emails de cette catégorie (Important, Promotions, Social, Marketing, Spam, General ou all)
    #[arg(short = 'c', long, default_value = "all")]
    category: CategoryFilter,

    /// Afficher les résultats sauvegardés sans rien récupérer
    #[arg(long)]
    show: bool,

    /// Supprimer les résultats sauvegardés
    #[arg(long)]
    clear: bool,

    /// Écrire aussi les emails affichés dans un fichier CSV
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Vérifier la configuration sans se connecter
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger le fichier .env s'il existe
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    let mut config = Config::new()?;
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }

    let store = ResultStore::new(&config.data_dir);

    if args.clear {
        if store.clear()? {
            println!("🗑️  Résultats sauvegardés supprimés");
        } else {
            println!("Rien à supprimer");
        }
        return Ok(());
    }

    if args.show {
        match store.load()? {
            Some(run) => report(&run, &args)?,
            None => println!("Aucun résultat sauvegardé dans {}", store.path().display()),
        }
        return Ok(());
    }

    config.check_required(args.input.is_none())?;

    if args.check_config {
        println!("✅ Configuration valide !");
        match &args.input {
            Some(path) => println!("📄 Fichier d'entrée : {}", path.display()),
            None => {
                println!("📧 Gmail API OAuth2");
                if let Some(path) = &config.gmail.credentials_path {
                    println!("🔑 Credentials : {}", path);
                }
                println!("💾 Cache du token : {}", config.gmail.token_cache_path);
            }
        }
        println!("🤖 Modèle : {} via {}", config.classifier.model, config.classifier.base_url);
        println!("⏱️  Espacement : {} ms, timeout : {} s", config.classifier.pacing_ms, config.classifier.timeout_secs);
        println!("📁 Répertoire des données : {}", config.data_dir);
        return Ok(());
    }

    if args.daemon {
        info!("🔄 Démarrage en mode daemon");
        return run_daemon_mode(config, args).await;
    }

    if args.dry_run {
        info!("🧪 Démarrage de mailsorter en mode DRY-RUN");
    } else {
        info!("🚀 Démarrage de mailsorter");
    }

    let cancel = CancellationToken::new();
    spawn_ctrl_c_watcher(cancel.clone());

    let limit = args.limit.unwrap_or(config.gmail.max_results);

    let result = if args.dry_run {
        let processor = EmailProcessor::new_dry_run(&config, args.input.clone()).await?;
        processor.process_emails(limit, &cancel).await
    } else {
        let processor = EmailProcessor::new(&config, args.input.clone()).await?;
        processor.process_emails(limit, &cancel).await
    };

    match result {
        Ok(run) => report(&run, &args),
        Err(e) => {
            error!("❌ Erreur lors de la classification des emails : {:#}", e);
            Err(e)
        }
    }
}

/// Annule le lot en cours sur Ctrl+C ; les résultats partiels sont conservés
fn spawn_ctrl_c_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️  Ctrl+C reçu, arrêt après l'email en cours");
            cancel.cancel();
        }
    });
}

fn report(run: &StoredRun, args: &Args) -> Result<()> {
    let shown = args.category.apply(&run.emails);

    println!("\n{}", "=".repeat(80));
    println!(
        "📬 Exécution {} ({}) | {} | filtre : {}",
        run.run_id,
        run.source,
        run.classified_at.format("%Y-%m-%d %H:%M:%S UTC"),
        args.category
    );
    println!("{}", "=".repeat(80));

    if shown.is_empty() {
        println!("Aucun email dans cette catégorie");
    }

    for email in &shown {
        println!(
            "[{:<10}] {:<50} {}",
            email.category.as_str(),
            truncate_chars(&email.email.subject, 50),
            email.email.from
        );
    }

    println!("{}", "-".repeat(80));
    println!("📊 Résumé : {}", run.summary);
    if run.failures > 0 {
        println!("⚠️  {} email(s) classé(s) General après une erreur de classification", run.failures);
    }
    if run.cancelled {
        println!("⏹️  Exécution annulée : {} email(s) classé(s)", run.emails.len());
    }

    if let Some(path) = &args.export_csv {
        let emails: Vec<_> = shown.into_iter().cloned().collect();
        export_csv(&emails, path)?;
        println!("📄 {} email(s) exporté(s) vers {}", emails.len(), path.display());
    }

    Ok(())
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use chrono::{Local, Timelike};
    use tokio_cron_scheduler::{Job, JobScheduler};

    if !config.scheduler.enabled {
        error!("❌ Le mode daemon nécessite SCHEDULER_ENABLED=true");
        anyhow::bail!("Scheduler non activé dans la configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ Aucun horaire défini (SCHEDULER_TIMES)");
        anyhow::bail!("Aucun horaire défini");
    }

    info!("📅 Horaires de classification configurés : {:?}", config.scheduler.schedule_times);

    let mut scheduler = JobScheduler::new().await?;
    let shutdown = CancellationToken::new();

    for schedule_time in &config.scheduler.schedule_times {
        let Some((hour, minute)) = parse_schedule_time(schedule_time) else {
            error!("❌ Horaire invalide : {}. Utiliser le format HH:MM", schedule_time);
            continue;
        };

        // Format cron : "sec min heure * * *" (tous les jours)
        let cron_expr = format!("0 {} {} * * *", minute, hour);
        info!("📆 Ajout du job planifié : {} (cron: {})", schedule_time, cron_expr);

        let config_clone = config.clone();
        let dry_run = args.dry_run;
        let input = args.input.clone();
        let limit = args.limit.unwrap_or(config.gmail.max_results);
        let schedule_time_clone = schedule_time.clone();
        let shutdown_clone = shutdown.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = config_clone.clone();
            let input = input.clone();
            let schedule_time = schedule_time_clone.clone();
            let cancel = shutdown_clone.child_token();

            Box::pin(async move {
                info!("⏰ Exécution planifiée à {} - Classification des emails...", schedule_time);

                let processor = if dry_run {
                    EmailProcessor::new_dry_run(&config, input).await
                } else {
                    EmailProcessor::new(&config, input).await
                };

                let processor = match processor {
                    Ok(p) => p,
                    Err(e) => {
                        error!("❌ Impossible de créer le processeur : {:#}", e);
                        return;
                    }
                };

                match processor.process_emails(limit, &cancel).await {
                    Ok(run) => {
                        info!(
                            "✅ Exécution planifiée terminée à {} : {} email(s), {}",
                            schedule_time,
                            run.emails.len(),
                            run.summary
                        );
                    }
                    Err(e) => {
                        error!("❌ Échec de l'exécution planifiée à {} : {:#}", schedule_time, e);
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;

    info!("✅ Mode daemon démarré. En attente des horaires planifiés...");
    info!("⏸️  Appuyez sur Ctrl+C pour arrêter le daemon");

    let mut heartbeat = tokio::time::interval(tokio::time::Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("⏹️  Ctrl+C reçu, arrêt du daemon");
                shutdown.cancel();
                break;
            }
            _ = heartbeat.tick() => {
                let now = Local::now();
                if now.minute() == 0 {
                    info!("💓 Daemon actif - {}", now.format("%Y-%m-%d %H:%M"));
                }
            }
        }
    }

    scheduler.shutdown().await?;
    Ok(())
}

fn parse_schedule_time(value: &str) -> Option<(u32, u32)> {
    let (hour, minute) = value.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}
