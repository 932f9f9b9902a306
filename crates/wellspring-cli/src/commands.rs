//! Command handlers. Each command makes one or two API calls and prints the
//! outcome; failures are shown using the message carried by the result.
//! Commands that only touch local state never build the API client.

use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use wellspring_core::api::ProductQuery;
use wellspring_core::models::{
    Cart, CartItemRequest, PaymentRequest, Product, ProfileUpdate, RegistrationRequest,
};
use wellspring_core::utils::{format_amount, truncate};
use wellspring_core::{ApiClient, ApiResult, Config, Language, SessionManager, UserSession};

/// Width of the project name column in listings
const NAME_COLUMN_WIDTH: usize = 36;

/// Number of projects shown on the home screen
const HOME_PRODUCT_COUNT: u32 = 5;

pub struct App {
    config: Config,
    sessions: SessionManager,
    api: OnceLock<ApiClient>,
}

impl App {
    pub fn new(config: Config, sessions: SessionManager) -> Self {
        Self {
            config,
            sessions,
            api: OnceLock::new(),
        }
    }

    pub async fn run(&self, args: &[&str]) -> Result<()> {
        match args {
            ["home"] => self.home().await,
            ["products"] => self.products(1, None).await,
            ["products", page] => self.products(parse(page, "page")?, None).await,
            ["products", page, category] => {
                self.products(parse(page, "page")?, Some(category.to_string())).await
            }
            ["product", id] => self.product(parse(id, "product id")?).await,

            ["register", name, phone] => self.register(name, phone, None).await,
            ["register", name, phone, email] => self.register(name, phone, Some(*email)).await,
            ["login", phone] => self.login(phone).await,
            ["verify", phone, code] => self.verify(phone, code).await,
            ["resend", phone] => self.resend(phone).await,
            ["skip-login"] => self.skip_login(),
            ["logout"] => self.logout(),

            ["profile"] => self.profile().await,
            ["profile", "set-name", name] => {
                self.update_profile(ProfileUpdate {
                    name: Some(name.to_string()),
                    ..ProfileUpdate::default()
                })
                .await
            }
            ["profile", "set-email", email] => {
                self.update_profile(ProfileUpdate {
                    email: Some(email.to_string()),
                    ..ProfileUpdate::default()
                })
                .await
            }

            ["cart"] => self.cart().await,
            ["cart", "add", product_id, rest @ ..] => self.cart_add(product_id, rest).await,
            ["cart", "set", item_id, quantity] => {
                self.cart_set(parse(item_id, "item id")?, parse(quantity, "quantity")?)
                    .await
            }
            ["cart", "remove", item_id] => self.cart_remove(parse(item_id, "item id")?).await,
            ["donate"] => self.donate(None).await,
            ["donate", dedication] => self.donate(Some(dedication.to_string())).await,

            ["lang"] => self.show_language(),
            ["lang", "toggle"] => self.set_language(None),
            ["lang", code] => self.set_language(Some(*code)),

            _ => bail!("Unknown command: {}. Run `wellspring help` for usage.", args.join(" ")),
        }
    }

    // ===== Helpers =====

    /// The shared client, built on first use from the config and the stored
    /// device id and language.
    fn api(&self) -> Result<&ApiClient> {
        if let Some(api) = self.api.get() {
            return Ok(api);
        }
        let language = self.sessions.language()?;
        let device_id = self.sessions.device_id()?;
        let api = ApiClient::new(self.config.client_settings(device_id, language)?)?;
        info!(base_url = api.base_url(), language = language.code(), "API client ready");
        Ok(self.api.get_or_init(|| api))
    }

    fn require_session(&self) -> Result<UserSession> {
        self.sessions
            .load()?
            .context("You are not signed in. Run `wellspring login <phone>` first.")
    }

    /// Like `take`, for calls made with the user's token: a 401 ends the
    /// local session.
    fn take_user<T>(&self, result: ApiResult<T>) -> Result<T> {
        if result.is_unauthorized() {
            warn!("User token rejected, signing out");
            self.sessions.logout()?;
            bail!("Your session has expired. Please sign in again.");
        }
        self.take(result)
    }

    /// Turn a result into its payload or an error carrying its message
    fn take<T>(&self, result: ApiResult<T>) -> Result<T> {
        if !result.success {
            bail!("{}", result.display_message());
        }
        let message = result.message.clone();
        match result.into_data() {
            Some(data) => Ok(data),
            None => bail!("{}", message.as_deref().unwrap_or("The server returned no data")),
        }
    }

    fn print_cart(cart: &Cart) {
        if cart.is_empty() {
            println!("Your cart is empty.");
            return;
        }
        for item in &cart.items {
            let name = item.product_name.as_deref().unwrap_or("Project");
            println!(
                "  [{}] {:<width$} x{:<3} {}",
                item.id,
                truncate(name, NAME_COLUMN_WIDTH),
                item.quantity,
                format_amount(item.line_total(), &cart.currency),
                width = NAME_COLUMN_WIDTH
            );
        }
        println!(
            "  {} item(s), total {}",
            cart.item_count(),
            format_amount(cart.total, &cart.currency)
        );
    }

    fn print_product_line(product: &Product) {
        let price = product
            .price
            .map(|p| format_amount(p, &product.currency))
            .unwrap_or_else(|| "any amount".to_string());
        let progress = product
            .progress_percent()
            .map(|p| format!("{:>3}% funded", p))
            .unwrap_or_default();
        println!(
            "  {:>5}  {:<width$}  {:>16}  {}",
            product.id,
            truncate(&product.name, NAME_COLUMN_WIDTH),
            price,
            progress,
            width = NAME_COLUMN_WIDTH
        );
    }

    // ===== Browsing =====

    async fn home(&self) -> Result<()> {
        let query = ProductQuery {
            per_page: Some(HOME_PRODUCT_COUNT),
            ..ProductQuery::default()
        };

        let api = self.api()?;
        let session = self.sessions.load()?;
        let products = api.fetch_products(&query);

        // Fetch the cart alongside the catalog when signed in
        let (products, cart) = match session {
            Some(ref s) => {
                let (p, c) = futures::future::join(products, api.fetch_cart(&s.token)).await;
                (p, Some(c))
            }
            None => (products.await, None),
        };

        if let Some(ref s) = session {
            println!("Welcome back, {}", s.user.display_name());
        } else if !self.sessions.skip_login()? {
            println!("Sign in with `wellspring login <phone>` or browse with `wellspring skip-login`.");
        }

        println!("\nFeatured projects:");
        for product in self.take(products)? {
            Self::print_product_line(&product);
        }

        if let Some(cart) = cart {
            println!("\nYour cart:");
            Self::print_cart(&self.take_user(cart)?);
        }
        Ok(())
    }

    async fn products(&self, page: u32, category: Option<String>) -> Result<()> {
        let query = ProductQuery {
            page: Some(page),
            category,
            ..ProductQuery::default()
        };
        let result = self.api()?.fetch_products(&query).await;
        let pagination = result.pagination().cloned();
        let products = self.take(result)?;

        if products.is_empty() {
            println!("No projects found.");
        }
        for product in &products {
            Self::print_product_line(product);
        }

        if let Some(p) = pagination {
            println!("\nPage {} of {} ({} projects)", p.current_page, p.total_pages, p.total);
            if p.has_next_page() {
                println!("Next: wellspring products {}", p.current_page + 1);
            }
        }
        Ok(())
    }

    async fn product(&self, id: i64) -> Result<()> {
        let product = self.take(self.api()?.fetch_product(id).await)?;

        println!("{}", product.name);
        if let Some(ref category) = product.category {
            println!("Category: {}", category);
        }
        match product.price {
            Some(price) => println!("Price: {}", format_amount(price, &product.currency)),
            None => println!("Price: any amount"),
        }
        if let (Some(target), Some(percent)) = (product.target_amount, product.progress_percent()) {
            println!(
                "Raised: {} of {} ({}%)",
                format_amount(product.raised_amount.unwrap_or(0.0), &product.currency),
                format_amount(target, &product.currency),
                percent
            );
        }
        if let Some(ref description) = product.description {
            println!("\n{}", description);
        }
        Ok(())
    }

    // ===== Account =====

    async fn register(&self, name: &str, phone: &str, email: Option<&str>) -> Result<()> {
        let request = RegistrationRequest {
            name: name.to_string(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
        };
        let result = self.api()?.register(&request).await;
        let message = result.message.clone();
        self.take(result)?;
        println!("{}", message.as_deref().unwrap_or("Account created."));
        println!("Enter the code you received with `wellspring verify {} <code>`.", phone);
        Ok(())
    }

    async fn login(&self, phone: &str) -> Result<()> {
        let challenge = self.take(self.api()?.request_login(phone).await)?;
        println!("A sign-in code was sent to {}.", challenge.phone.as_deref().unwrap_or(phone));
        if let Some(seconds) = challenge.resend_after {
            println!("You can request a new code in {} seconds.", seconds);
        }
        Ok(())
    }

    async fn verify(&self, phone: &str, code: &str) -> Result<()> {
        let payload = self.take(self.api()?.verify_otp(phone, code).await)?;
        let session = self.sessions.save_login(&payload)?;
        println!("Signed in as {}.", session.user.display_name());
        Ok(())
    }

    async fn resend(&self, phone: &str) -> Result<()> {
        self.take(self.api()?.resend_otp(phone).await)?;
        println!("A new code was sent to {}.", phone);
        Ok(())
    }

    fn skip_login(&self) -> Result<()> {
        self.sessions.set_skip_login(true)?;
        println!("Browsing as a guest. Sign in any time to donate.");
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        self.sessions.logout()?;
        println!("Signed out.");
        Ok(())
    }

    async fn profile(&self) -> Result<()> {
        let session = self.require_session()?;
        let user = self.take_user(self.api()?.fetch_profile(&session.token).await)?;
        self.sessions.update_user(&user)?;

        println!("Name:  {}", user.display_name());
        println!("Phone: {}", user.phone);
        if let Some(ref email) = user.email {
            println!("Email: {}", email);
        }
        Ok(())
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<()> {
        let session = self.require_session()?;
        let user = self.take_user(self.api()?.update_profile(&session.token, &update).await)?;
        self.sessions.update_user(&user)?;
        println!("Profile updated.");
        Ok(())
    }

    // ===== Cart & payment =====

    async fn cart(&self) -> Result<()> {
        let session = self.require_session()?;
        let cart = self.take_user(self.api()?.fetch_cart(&session.token).await)?;
        Self::print_cart(&cart);
        Ok(())
    }

    async fn cart_add(&self, product_id: &str, rest: &[&str]) -> Result<()> {
        let session = self.require_session()?;
        let quantity = match rest.first() {
            Some(q) => parse(q, "quantity")?,
            None => 1,
        };
        let amount = match rest.get(1) {
            Some(a) => Some(parse::<f64>(a, "amount")?),
            None => None,
        };
        if quantity == 0 {
            bail!("Quantity must be at least 1");
        }

        let request = CartItemRequest {
            product_id: parse(product_id, "product id")?,
            quantity,
            amount,
        };
        let cart = self.take_user(self.api()?.add_to_cart(&session.token, &request).await)?;
        println!("Added to cart.");
        Self::print_cart(&cart);
        Ok(())
    }

    async fn cart_set(&self, item_id: i64, quantity: u32) -> Result<()> {
        let session = self.require_session()?;
        let result = if quantity == 0 {
            self.api()?.remove_cart_item(&session.token, item_id).await
        } else {
            self.api()?.update_cart_item(&session.token, item_id, quantity).await
        };
        Self::print_cart(&self.take_user(result)?);
        Ok(())
    }

    async fn cart_remove(&self, item_id: i64) -> Result<()> {
        let session = self.require_session()?;
        let cart = self.take_user(self.api()?.remove_cart_item(&session.token, item_id).await)?;
        println!("Removed.");
        Self::print_cart(&cart);
        Ok(())
    }

    async fn donate(&self, dedication: Option<String>) -> Result<()> {
        let session = self.require_session()?;
        let request = PaymentRequest {
            dedication,
            ..PaymentRequest::default()
        };
        let payment = self.take_user(self.api()?.initiate_payment(&session.token, &request).await)?;
        debug!(payment_id = %payment.payment_id, "Checkout started");

        println!("Complete your donation here:\n{}", payment.checkout_url);
        Ok(())
    }

    // ===== Settings =====

    fn show_language(&self) -> Result<()> {
        let language = self.sessions.language()?;
        println!("{} ({})", language, language.code());
        Ok(())
    }

    /// Switch to `code`, or to the other language when `None`
    fn set_language(&self, code: Option<&str>) -> Result<()> {
        let language = match code {
            Some(code) => Language::from_code(code)
                .with_context(|| format!("Unsupported language {:?}; use ar or en", code))?,
            None => self.sessions.language()?.toggle(),
        };
        self.sessions.set_language(language)?;
        if let Some(api) = self.api.get() {
            api.set_language(language);
        }
        println!("Language set to {}.", language);
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {}: {}", what, value))
}
