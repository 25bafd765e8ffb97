//! Dashboard statistics
//!
//! Aggregated in memory over the rows fetched for a dashboard.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::appointments::AppointmentStatus;
use super::profiles::Role;

/// The slice of an appointment the dashboards need
#[derive(Debug, Clone)]
pub struct AppointmentFigures {
    pub status: AppointmentStatus,
    pub total_price: Decimal,
    pub appointment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_professionals: i64,
    pub total_customers: i64,
    pub pending_appointments: i64,
    pub upcoming_appointments: i64,
    pub total_revenue: Decimal,
    pub monthly_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfessionalDashboardStats {
    pub today_appointments: i64,
    pub week_appointments: i64,
    pub month_revenue: Decimal,
    pub completed_appointments: i64,
    pub pending_appointments: i64,
}

fn same_month(at: DateTime<Utc>, today: NaiveDate) -> bool {
    at.year() == today.year() && at.month() == today.month()
}

/// Sunday of the week containing `today`
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(i64::from(today.weekday().num_days_from_sunday()))
}

pub fn admin_stats(
    roles: &[Role],
    appointments: &[AppointmentFigures],
    today: NaiveDate,
) -> AdminDashboardStats {
    let count_role = |r: Role| roles.iter().filter(|&&x| x == r).count() as i64;

    let pending_appointments = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Pending)
        .count() as i64;
    let upcoming_appointments = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Confirmed && a.appointment_date >= today)
        .count() as i64;
    let total_revenue = appointments.iter().map(|a| a.total_price).sum();
    let monthly_revenue = appointments
        .iter()
        .filter(|a| same_month(a.created_at, today))
        .map(|a| a.total_price)
        .sum();

    AdminDashboardStats {
        total_users: roles.len() as i64,
        total_professionals: count_role(Role::Professional),
        total_customers: count_role(Role::Customer),
        pending_appointments,
        upcoming_appointments,
        total_revenue,
        monthly_revenue,
    }
}

pub fn professional_stats(
    appointments: &[AppointmentFigures],
    today: NaiveDate,
) -> ProfessionalDashboardStats {
    let week_start = week_start(today);
    let with_status = |status: AppointmentStatus| {
        appointments.iter().filter(|a| a.status == status).count() as i64
    };

    ProfessionalDashboardStats {
        today_appointments: appointments
            .iter()
            .filter(|a| a.appointment_date == today)
            .count() as i64,
        week_appointments: appointments
            .iter()
            .filter(|a| a.appointment_date >= week_start)
            .count() as i64,
        month_revenue: appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed && same_month(a.created_at, today))
            .map(|a| a.total_price)
            .sum(),
        completed_appointments: with_status(AppointmentStatus::Completed),
        pending_appointments: with_status(AppointmentStatus::Pending),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn figures(
        status: AppointmentStatus,
        price: i64,
        on: NaiveDate,
        created: (i32, u32, u32),
    ) -> AppointmentFigures {
        AppointmentFigures {
            status,
            total_price: Decimal::new(price, 0),
            appointment_date: on,
            created_at: Utc
                .with_ymd_and_hms(created.0, created.1, created.2, 12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2024-06-12 was a Wednesday
        assert_eq!(week_start(date(2024, 6, 12)), date(2024, 6, 9));
        assert_eq!(week_start(date(2024, 6, 9)), date(2024, 6, 9));
    }

    #[test]
    fn admin_stats_count_roles_and_revenue() {
        let today = date(2024, 6, 12);
        let roles = [Role::Admin, Role::Professional, Role::Professional, Role::Customer];
        let appts = [
            figures(AppointmentStatus::Pending, 80, date(2024, 6, 20), (2024, 6, 1)),
            figures(AppointmentStatus::Confirmed, 100, date(2024, 6, 13), (2024, 6, 2)),
            figures(AppointmentStatus::Confirmed, 50, date(2024, 6, 1), (2024, 5, 20)),
            figures(AppointmentStatus::Cancelled, 70, date(2024, 6, 15), (2024, 6, 3)),
        ];

        let stats = admin_stats(&roles, &appts, today);
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.total_professionals, 2);
        assert_eq!(stats.total_customers, 1);
        assert_eq!(stats.pending_appointments, 1);
        assert_eq!(stats.upcoming_appointments, 1);
        assert_eq!(stats.total_revenue, Decimal::new(300, 0));
        assert_eq!(stats.monthly_revenue, Decimal::new(250, 0));
    }

    #[test]
    fn professional_stats_only_count_completed_revenue() {
        let today = date(2024, 6, 12);
        let appts = [
            figures(AppointmentStatus::Completed, 90, date(2024, 6, 10), (2024, 6, 1)),
            figures(AppointmentStatus::Completed, 60, date(2024, 5, 30), (2024, 5, 25)),
            figures(AppointmentStatus::Pending, 40, today, (2024, 6, 11)),
            figures(AppointmentStatus::Confirmed, 40, date(2024, 6, 8), (2024, 6, 2)),
        ];

        let stats = professional_stats(&appts, today);
        assert_eq!(stats.today_appointments, 1);
        assert_eq!(stats.week_appointments, 2);
        assert_eq!(stats.month_revenue, Decimal::new(90, 0));
        assert_eq!(stats.completed_appointments, 2);
        assert_eq!(stats.pending_appointments, 1);
    }

    #[test]
    fn empty_dashboards_are_zeroed() {
        let stats = professional_stats(&[], date(2024, 1, 1));
        assert_eq!(stats.month_revenue, Decimal::ZERO);
        assert_eq!(admin_stats(&[], &[], date(2024, 1, 1)).total_users, 0);
    }
}
