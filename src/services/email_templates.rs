//! Transactional email templates for cleaner-facing notifications.
//!
//! Supported templates:
//!   - `PreferredCleanerEmail` — a homeowner designated the cleaner as preferred
//!   - `UrgentJobEmail`        — last-minute job available near the cleaner
//!
//! The `render()` method returns an `EmailMessage` ready to pass to
//! `EmailSender::send`.

use chrono::NaiveDate;

use crate::services::email_sender::EmailMessage;

/// "$120.00" from 12000 cents
fn format_price(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

// =============================================================================
// Preferred-cleaner designation
// =============================================================================

pub struct PreferredCleanerEmail<'a> {
    pub to: &'a str,
    pub cleaner_name: &'a str,
}

impl<'a> PreferredCleanerEmail<'a> {
    pub fn render(&self) -> EmailMessage {
        let subject = "You're now a preferred cleaner – Brightnest";
        let html = format!(
            r#"<p>Hi {name},</p>
<p>Great news — one of your clients just added you as a <strong>preferred cleaner</strong> for their home.</p>
<p>From now on, when you request a job at that home it is booked directly, with no approval round-trip.</p>
<p>Keep up the great work!</p>"#,
            name = self.cleaner_name
        );
        let text = format!(
            "Hi {},\n\nOne of your clients just added you as a preferred cleaner for their home. \
Your future job requests at that home will be booked directly, with no approval needed.\n\nKeep up the great work!",
            self.cleaner_name
        );

        EmailMessage {
            to: self.to.to_string(),
            subject: subject.to_string(),
            html,
            text,
        }
    }
}

// =============================================================================
// Urgent last-minute job
// =============================================================================

pub struct UrgentJobEmail<'a> {
    pub to: &'a str,
    pub city: &'a str,
    pub price_cents: i64,
    pub distance_miles: f64,
    pub scheduled_date: NaiveDate,
}

impl<'a> UrgentJobEmail<'a> {
    pub fn render(&self) -> EmailMessage {
        let price = format_price(self.price_cents);
        let subject = format!("Urgent: {} cleaning job in {} – Brightnest", price, self.city);
        let html = format!(
            r#"<p>Hello,</p>
<p>A last-minute cleaning job just opened up near you:</p>
<ul>
  <li><strong>Pay:</strong> {price}</li>
  <li><strong>Location:</strong> {city} ({distance:.1} miles from your service area)</li>
  <li><strong>Date:</strong> {date}</li>
</ul>
<p>This job needs a cleaner today — first come, first served. Open the Brightnest app to claim it.</p>"#,
            price = price,
            city = self.city,
            distance = self.distance_miles,
            date = self.scheduled_date.format("%B %-d, %Y"),
        );
        let text = format!(
            "Hello,\n\nA last-minute cleaning job just opened up near you:\n\n\
Pay: {}\nLocation: {} ({:.1} miles from your service area)\nDate: {}\n\n\
First come, first served — open the Brightnest app to claim it.",
            price,
            self.city,
            self.distance_miles,
            self.scheduled_date.format("%B %-d, %Y"),
        );

        EmailMessage {
            to: self.to.to_string(),
            subject,
            html,
            text,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
