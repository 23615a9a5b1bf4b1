use crate::{BookingConfirmation, Notice};

pub(crate) struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub(crate) fn render(notice: &Notice, brand: &str) -> RenderedEmail {
    match notice {
        Notice::VerificationCode { name, code, .. } => verification_code(brand, name, code),
        Notice::PasswordReset { name, link, .. } => password_reset(brand, name, link),
        Notice::BookingConfirmed(details) => booking_confirmed(brand, details),
    }
}

fn verification_code(brand: &str, name: &str, code: &str) -> RenderedEmail {
    let body = format!(
        r#"<p>Hello <strong>{name}</strong>,</p>
<p>To complete your registration, use the following verification code:</p>
<p style="font-size: 32px; font-weight: bold; letter-spacing: 10px;">{code}</p>
<p>This code will expire in <strong>10 minutes</strong>. If you did not request this, please ignore this email.</p>"#,
        name = escape(name),
        code = escape(code),
    );

    RenderedEmail {
        subject: format!("Verify Your Identity - {}", brand),
        html: layout(brand, "Verify Your Email", &body),
        text: format!(
            "Hello {name},\n\n\
             To complete your registration, use the following verification code:\n\n\
             {code}\n\n\
             This code will expire in 10 minutes. If you did not request this, please ignore this email.\n\n\
             {brand}",
        ),
    }
}

fn password_reset(brand: &str, name: &str, link: &str) -> RenderedEmail {
    let body = format!(
        r#"<p>Hello <strong>{name}</strong>,</p>
<p>We received a request to reset the password for your account. Click the button below to choose a new one:</p>
<p style="margin: 32px 0;"><a href="{link}" style="background: #000000; color: #ffffff; padding: 16px 28px; border-radius: 50px; text-decoration: none; font-weight: bold;">Reset Password</a></p>
<p>This link will expire in <strong>1 hour</strong>. If you did not request this change, you can safely ignore this email.</p>"#,
        name = escape(name),
        link = escape(link),
    );

    RenderedEmail {
        subject: format!("Reset Your Password - {}", brand),
        html: layout(brand, "Restore Your Access", &body),
        text: format!(
            "Hello {name},\n\n\
             We received a request to reset the password for your account.\n\
             Open this link to choose a new one:\n\n\
             {link}\n\n\
             This link will expire in 1 hour. If you did not request this change, you can safely ignore this email.\n\n\
             {brand}",
        ),
    }
}

fn booking_confirmed(brand: &str, d: &BookingConfirmation) -> RenderedEmail {
    let row = |label: &str, value: &str| {
        format!(
            r#"<tr><td style="color: #999999; text-transform: uppercase;">{}</td><td style="font-weight: bold; text-align: right;">{}</td></tr>"#,
            label,
            escape(value)
        )
    };
    let total = format_price(d.total_price);

    let body = format!(
        r#"<p>Hello <strong>{name}</strong>,</p>
<p>Your stay is officially reserved. We look forward to welcoming you.</p>
<table style="width: 100%; background: #f9f9f9; border-radius: 12px; padding: 20px;">
{room}
{check_in}
{check_out}
{guests}
{total}
</table>
<p style="text-align: center; color: #999999;">Booking ID: {id}</p>
<p style="text-align: center; margin: 32px 0;"><a href="{url}" style="background: #000000; color: #ffffff; padding: 16px 28px; border-radius: 50px; text-decoration: none; font-weight: bold;">View My Bookings</a></p>"#,
        name = escape(&d.user_name),
        room = row("Room", &d.room_name),
        check_in = row("Check-In", &d.check_in),
        check_out = row("Check-Out", &d.check_out),
        guests = row("Guests", &d.guests.to_string()),
        total = row("Total Amount", &format!("GHC {}", total)),
        id = escape(&d.booking_id),
        url = escape(&d.bookings_url),
    );

    RenderedEmail {
        subject: format!("Your Stay is Confirmed - {}", d.room_name),
        html: layout(brand, "Reservation Confirmed", &body),
        text: format!(
            "Hello {name},\n\n\
             Your stay is officially reserved.\n\n\
             Room:       {room}\n\
             Check-In:   {check_in}\n\
             Check-Out:  {check_out}\n\
             Guests:     {guests}\n\
             Total:      GHC {total}\n\n\
             Booking ID: {id}\n\
             View your bookings: {url}\n\n\
             {brand}",
            name = d.user_name,
            room = d.room_name,
            check_in = d.check_in,
            check_out = d.check_out,
            guests = d.guests,
            id = d.booking_id,
            url = d.bookings_url,
        ),
    }
}

fn layout(brand: &str, heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; background-color: #f7f7f7; padding: 20px;">
<div style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 20px; overflow: hidden;">
  <div style="background: #000000; padding: 36px 20px; text-align: center;">
    <h1 style="color: #ffffff; margin: 0; font-family: Georgia, serif; font-size: 24px; letter-spacing: 0.1em; text-transform: uppercase;">{brand}</h1>
  </div>
  <div style="padding: 36px; color: #444444; line-height: 1.6;">
    <h2 style="color: #1a1a1a; margin-top: 0; text-align: center;">{heading}</h2>
    {body}
  </div>
  <div style="padding: 20px; text-align: center; color: #999999; font-size: 12px; border-top: 1px solid #eeeeee;">
    &copy; {brand}. All rights reserved.
  </div>
</div>
</body>
</html>"#,
        brand = escape(brand),
        heading = escape(heading),
        body = body,
    )
}

/// Whole amounts print without decimals.
fn format_price(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_email_carries_the_code() {
        let email = render(
            &Notice::VerificationCode {
                to: "ama@x.com".to_string(),
                name: "Ama".to_string(),
                code: "042917".to_string(),
            },
            "The African Palace",
        );
        assert_eq!(email.subject, "Verify Your Identity - The African Palace");
        assert!(email.html.contains("042917"));
        assert!(email.text.contains("042917"));
        assert!(email.text.contains("10 minutes"));
    }

    #[test]
    fn user_supplied_text_is_escaped_in_html() {
        let email = render(
            &Notice::VerificationCode {
                to: "x@x.com".to_string(),
                name: "<script>alert(1)</script>".to_string(),
                code: "000000".to_string(),
            },
            "Palace",
        );
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }

    #[test]
    fn booking_confirmation_lists_the_stay() {
        let email = render(
            &Notice::BookingConfirmed(BookingConfirmation {
                to: "ama@x.com".to_string(),
                user_name: "Ama".to_string(),
                room_name: "Deluxe Suite".to_string(),
                check_in: "2026-03-01".to_string(),
                check_out: "2026-03-03".to_string(),
                guests: 2,
                total_price: 1000.0,
                booking_id: "b-1".to_string(),
                bookings_url: "http://localhost:3000/profile".to_string(),
            }),
            "The African Palace",
        );
        assert_eq!(email.subject, "Your Stay is Confirmed - Deluxe Suite");
        assert!(email.text.contains("GHC 1000"));
        assert!(email.text.contains("2026-03-03"));
        assert!(email.html.contains("http://localhost:3000/profile"));
    }

    #[test]
    fn prices_drop_trailing_zero_cents() {
        assert_eq!(format_price(1000.0), "1000");
        assert_eq!(format_price(99.5), "99.50");
    }
}
