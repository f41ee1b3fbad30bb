//! Page interactions of each booking step.

use std::time::Duration;

use base64::Engine;
use chrono::Datelike;

use crate::automation::{AutomationSurface, Key, SurfaceError};
use crate::booking::BookingResult;
use crate::events::Severity;
use crate::input::InputKind;

use super::pipeline::BookingBot;
use super::selectors as sel;
use super::types::{BotError, BotStep};

/// Attach the failing step to a surface error.
trait AtStep<T> {
    fn at(self, step: BotStep) -> Result<T, BotError>;
}

impl<T> AtStep<T> for Result<T, SurfaceError> {
    fn at(self, step: BotStep) -> Result<T, BotError> {
        self.map_err(|e| BotError::step(step, e.to_string()))
    }
}

/// Wait for a selector that must appear.
async fn require(
    surface: &dyn AutomationSurface,
    selector: &str,
    timeout: Duration,
    step: BotStep,
) -> Result<(), BotError> {
    if surface.wait_for(selector, timeout).await.at(step)? {
        Ok(())
    } else {
        let err = SurfaceError::timeout(selector, timeout.as_millis() as u64);
        Err(BotError::step(step, err.to_string()))
    }
}

async fn capture(
    surface: &dyn AutomationSurface,
    selector: &str,
    step: BotStep,
) -> Result<String, BotError> {
    let png = surface.screenshot(Some(selector)).await.at(step)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}

impl BookingBot {
    pub(super) async fn login(&self, surface: &dyn AutomationSurface) -> Result<(), BotError> {
        let step = BotStep::Login;

        surface.navigate(&self.settings.search_url()).await.at(step)?;
        require(surface, sel::LOGIN_LINK, self.settings.page_timeout, step).await?;
        surface.click(sel::LOGIN_LINK).await.at(step)?;
        require(surface, sel::USER_ID, self.settings.element_timeout, step).await?;

        let credentials = self.credentials.resolve(&self.config.credentials).await?;
        surface
            .fill(sel::USER_ID, &credentials.username)
            .await
            .at(step)?;
        surface
            .fill(sel::PASSWORD, &credentials.password)
            .await
            .at(step)?;

        if surface.is_visible(sel::LOGIN_CAPTCHA).await.at(step)? {
            let image = capture(surface, sel::LOGIN_CAPTCHA, step).await?;
            let answer = self.suspend(InputKind::Captcha, Some(image)).await?;
            surface.fill(sel::LOGIN_CAPTCHA, &answer).await.at(step)?;
        }

        surface.click(sel::SIGN_IN).await.at(step)?;

        if surface
            .wait_for(sel::OTP_MODAL, self.settings.otp_detect_timeout)
            .await
            .at(step)?
        {
            let otp = self.suspend(InputKind::Otp, None).await?;
            surface.fill(sel::OTP_INPUT, &otp).await.at(step)?;
            surface.click(sel::OTP_CONTINUE).await.at(step)?;
        }

        if !surface
            .wait_for(sel::LOGGED_IN, self.settings.page_timeout)
            .await
            .at(step)?
        {
            return Err(BotError::step(
                step,
                "timed out waiting for login confirmation",
            ));
        }

        self.notify("Login successful", Severity::Success);
        Ok(())
    }

    pub(super) async fn search_trains(
        &self,
        surface: &dyn AutomationSurface,
    ) -> Result<(), BotError> {
        let step = BotStep::TrainSearch;
        let config = &self.config;

        surface.navigate(&self.settings.search_url()).await.at(step)?;

        for (selector, station) in [
            (sel::ORIGIN, &config.from_station),
            (sel::DESTINATION, &config.to_station),
        ] {
            require(surface, selector, self.settings.element_timeout, step).await?;
            surface.click(selector).await.at(step)?;
            surface.fill(selector, station).await.at(step)?;
            surface.press(selector, Key::ArrowDown).await.at(step)?;
            surface.press(selector, Key::Enter).await.at(step)?;
        }

        surface.click(sel::JOURNEY_DATE).await.at(step)?;
        surface
            .click(&sel::calendar_day(config.journey_date.day()))
            .await
            .at(step)?;

        surface
            .select_option(sel::JOURNEY_CLASS, config.travel_class.code())
            .await
            .at(step)?;
        surface
            .select_option(sel::JOURNEY_QUOTA, config.quota.code())
            .await
            .at(step)?;

        surface.click(sel::SEARCH).await.at(step)?;
        require(surface, sel::TRAIN_LIST, self.settings.page_timeout, step).await?;

        self.notify("Train search completed", Severity::Success);
        Ok(())
    }

    pub(super) async fn select_train(
        &self,
        surface: &dyn AutomationSurface,
    ) -> Result<(), BotError> {
        let step = BotStep::TrainSelection;
        let timeout = self.settings.element_timeout;

        if let Some(ref number) = self.config.train_number {
            let preferred = sel::train(number);
            if surface.wait_for(&preferred, timeout).await.at(step)? {
                surface.click(&preferred).await.at(step)?;
                self.notify(format!("Train {} selected", number), Severity::Success);
                return Ok(());
            }
            self.notify(
                format!(
                    "Preferred train {} not found, selecting first available",
                    number
                ),
                Severity::Warning,
            );
        }

        require(surface, sel::FIRST_BOOKABLE, timeout, step).await?;
        surface.click(sel::FIRST_BOOKABLE).await.at(step)?;

        self.notify("Train selected", Severity::Success);
        Ok(())
    }

    pub(super) async fn fill_passenger_details(
        &self,
        surface: &dyn AutomationSurface,
    ) -> Result<(), BotError> {
        let step = BotStep::PassengerDetails;
        let config = &self.config;

        require(surface, sel::PASSENGER_FORM, self.settings.page_timeout, step).await?;

        for (i, passenger) in config.passengers.iter().enumerate() {
            surface
                .fill(&sel::passenger_name(i), &passenger.name)
                .await
                .at(step)?;
            surface
                .fill(&sel::passenger_age(i), &passenger.age.to_string())
                .await
                .at(step)?;
            surface
                .select_option(&sel::passenger_gender(i), passenger.gender.code())
                .await
                .at(step)?;
            if let Some(berth) = passenger.berth_preference {
                surface
                    .select_option(&sel::passenger_berth(i), berth.code())
                    .await
                    .at(step)?;
            }
        }

        if config.auto_upgrade {
            surface.click(sel::AUTO_UPGRADE).await.at(step)?;
        }
        if config.travel_insurance {
            surface.click(sel::TRAVEL_INSURANCE).await.at(step)?;
        }

        if surface
            .wait_for(sel::BOOKING_CAPTCHA_IMAGE, self.settings.captcha_detect_timeout)
            .await
            .at(step)?
        {
            let image = capture(surface, sel::BOOKING_CAPTCHA_IMAGE, step).await?;
            let answer = self.suspend(InputKind::Captcha, Some(image)).await?;
            surface
                .fill(sel::BOOKING_CAPTCHA_INPUT, &answer)
                .await
                .at(step)?;
        }

        surface.click(sel::REVIEW_BOOKING).await.at(step)?;

        self.notify("Passenger details filled", Severity::Success);
        Ok(())
    }

    pub(super) async fn pay(&self, surface: &dyn AutomationSurface) -> Result<(), BotError> {
        let step = BotStep::Payment;
        let payment = &self.config.payment;

        require(surface, sel::PAYMENT_OPTIONS, self.settings.page_timeout, step).await?;
        surface.click(sel::UPI_OPTION).await.at(step)?;

        if let Some(ref gateway) = payment.upi_gateway {
            surface.click(&sel::upi_gateway(gateway)).await.at(step)?;
        }
        if let Some(ref upi_id) = payment.upi_id {
            surface.fill(sel::UPI_ID, upi_id).await.at(step)?;
        }

        surface.click(sel::MAKE_PAYMENT).await.at(step)?;
        self.notify(
            "Redirected to payment gateway, please complete payment",
            Severity::Warning,
        );

        // A payment still pending after the timeout is reported, not failed.
        if surface
            .wait_for_url(sel::CONFIRMATION_URL, self.settings.payment_timeout)
            .await
            .at(step)?
        {
            self.notify("Payment completed", Severity::Success);
        } else {
            self.notify("Payment timeout, please check manually", Severity::Warning);
        }
        Ok(())
    }

    pub(super) async fn confirm(
        &self,
        surface: &dyn AutomationSurface,
    ) -> Result<BookingResult, BotError> {
        let step = BotStep::Confirmation;

        if !surface
            .wait_for(sel::PNR_DETAILS, self.settings.confirmation_timeout)
            .await
            .at(step)?
        {
            return Ok(BookingResult::unknown(
                &self.run_id,
                &self.config,
                "Confirmation page did not load",
            ));
        }

        if surface.is_visible(sel::PNR_NUMBER).await.at(step)? {
            let pnr = surface.text_content(sel::PNR_NUMBER).await.at(step)?;
            let pnr = pnr.trim();
            if !pnr.is_empty() {
                return Ok(BookingResult::success(
                    &self.run_id,
                    &self.config,
                    pnr.to_string(),
                ));
            }
        }

        if surface.is_visible(sel::BOOKING_FAILED).await.at(step)? {
            let message = surface.text_content(sel::BOOKING_FAILED).await.at(step)?;
            let message = message.trim();
            let detail = if message.is_empty() {
                "Booking rejected by the booking site"
            } else {
                message
            };
            return Ok(BookingResult::failed(&self.run_id, &self.config, detail));
        }

        Ok(BookingResult::unknown(
            &self.run_id,
            &self.config,
            "Unable to determine booking status",
        ))
    }
}
