use anyhow::Context;
use card_binding::utils::error::{BindingError, ErrorSeverity};
use card_binding::utils::{logger, validation::Validate};
use card_binding::{
    Account, CliConfig, Command, CustomerPaymentBinding, LocalAccountStore, PaymentMethod,
    StripeProcessor, TomlConfig,
};
use clap::Parser;

type Binding = CustomerPaymentBinding<StripeProcessor, LocalAccountStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入 TOML 配置
    let config = TomlConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config file '{}'", cli.config))?;

    // 初始化日誌
    if config.json_logging() {
        logger::init_json_logger(cli.verbose, config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, config.log_level());
    }

    tracing::info!("🚀 Starting card-binding");
    tracing::debug!("📁 Config loaded from: {}", cli.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let processor =
        StripeProcessor::new(&config).context("failed to initialise processor client")?;
    let store = LocalAccountStore::new(config.store_path());
    tracing::debug!("📒 Account store: {}", store.path().display());
    let binding = CustomerPaymentBinding::with_timeout(processor, store, config.timeout());

    if let Err(e) = run(&binding, cli.command).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn load_account(binding: &Binding, account_id: &str) -> Result<Account, BindingError> {
    Ok(binding
        .store()
        .load_account(account_id)
        .await?
        .unwrap_or_else(|| Account::new(account_id)))
}

async fn run(binding: &Binding, command: Command) -> Result<(), BindingError> {
    let mut account = load_account(binding, command.account_id()).await?;

    match command {
        Command::Provision { email, name, .. } => {
            if email.is_some() {
                account.email = email;
            }
            if name.is_some() {
                account.name = name;
            }
            binding.store().save_account(&account).await?;

            let already_linked = account.has_remote_customer();
            let customer_id = binding.ensure_remote_customer(&mut account).await?;
            if already_linked {
                println!("ℹ️  {} already linked to {}", account.id, customer_id);
            } else {
                println!("✅ {} → {}", account.id, customer_id);
            }
        }
        Command::SetDefault { reference, .. } => {
            binding
                .set_default_payment_method(&mut account, &reference.as_str().into())
                .await?;
            match &account.card {
                Some(card) => println!("✅ Default card: {} •••• {}", card.brand, card.last_four),
                None => println!("✅ Default payment method updated"),
            }
        }
        Command::ShowDefault { .. } => {
            let method = binding.get_default_payment_method(&account).await?;
            print_method(&method);
        }
        Command::List { .. } => {
            let methods = binding.payment_methods(&account).await?;
            if methods.is_empty() {
                println!("No payment methods on file for {}", account.id);
            }
            for method in &methods {
                print_method(method);
            }
        }
    }

    Ok(())
}

fn print_method(method: &PaymentMethod) {
    match method.card() {
        Some(card) => println!(
            "{}  {} •••• {}  exp {:02}/{}",
            method.id, card.brand, card.last4, card.exp_month, card.exp_year
        ),
        None => println!("{}  {}", method.id, method.instrument.type_tag()),
    }
}
