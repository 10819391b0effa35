//! Template-based period diagnosis built from a dashboard snapshot.

use std::fmt;

use crate::aggregate::DashboardSnapshot;
use crate::classify::classify;
use crate::models::{StatusLabel, TrendDirection};

pub const INSUFFICIENT_DATA: &str =
    "Não há dados suficientes para gerar uma análise neste período.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrative {
    InsufficientData,
    Analysis {
        headline: String,
        alerts: String,
        highlights: Vec<String>,
        trend: Option<String>,
    },
}

impl fmt::Display for Narrative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Narrative::InsufficientData => f.write_str(INSUFFICIENT_DATA),
            Narrative::Analysis {
                headline,
                alerts,
                highlights,
                trend,
            } => {
                write!(f, "{headline}\n\n{alerts}")?;
                if !highlights.is_empty() {
                    write!(f, "\n\n{}", highlights.join(" "))?;
                }
                if let Some(trend) = trend {
                    write!(f, "\n\n{trend}")?;
                }
                Ok(())
            }
        }
    }
}

pub fn build_narrative(snapshot: &DashboardSnapshot) -> Narrative {
    let kpis = &snapshot.kpis;
    if kpis.session_count == 0 {
        return Narrative::InsufficientData;
    }

    Narrative::Analysis {
        headline: headline(snapshot),
        alerts: alert_summary(snapshot),
        highlights: highlights(snapshot),
        trend: trend_statement(snapshot),
    }
}

fn headline(snapshot: &DashboardSnapshot) -> String {
    let kpis = &snapshot.kpis;
    let mut text = format!(
        "Analisei **{} aulas** e **{} presenças** ({} alunos distintos) no período selecionado. ",
        kpis.session_count, kpis.total_presences, kpis.unique_students
    );

    let ratio = kpis.mean_ratio;
    let judgement = match classify(ratio, snapshot.tier).status {
        StatusLabel::Loss => format!(
            "O cenário requer atenção imediata: a média geral é de **{ratio:.1} alunos/prof**, o que indica ociosidade na grade."
        ),
        StatusLabel::Normal => format!(
            "A operação está saudável, com média de **{ratio:.1} alunos/prof**, dentro da meta esperada."
        ),
        StatusLabel::Profitable => format!(
            "A operação está lucrativa, com média de **{ratio:.1} alunos/prof**, acima da meta VIP."
        ),
        StatusLabel::OverCapacity => format!(
            "Performance excelente! A média de **{ratio:.1} alunos/prof** sugere alta demanda e possível necessidade de expansão."
        ),
    };
    text.push_str(&judgement);
    text
}

fn alert_summary(snapshot: &DashboardSnapshot) -> String {
    let kpis = &snapshot.kpis;
    let mut text = String::new();

    if kpis.alert_count == 0 {
        text.push_str("Nenhuma aula operou no vermelho neste recorte.");
    } else {
        let share = (kpis.alert_count as f64 / kpis.session_count as f64 * 100.0).round();
        text.push_str(&format!(
            "**Atenção:** detectei **{} aulas** operando no vermelho. Isso representa {share:.0}% da grade deste recorte.",
            kpis.alert_count
        ));
        if let Some(critical) = &snapshot.critical_time {
            text.push_str(&format!(
                " O horário mais crítico é o das **{}**, com {} alertas e média de {:.1} alunos/prof.",
                critical.time_slot, critical.alert_count, critical.mean_ratio
            ));
        }
    }

    if kpis.over_capacity_count > 0 {
        text.push_str(&format!(
            " **Oportunidade:** temos **{} turmas superlotadas**. Considere abrir horários paralelos ou aumentar o ticket destas sessões.",
            kpis.over_capacity_count
        ));
    }

    text
}

fn highlights(snapshot: &DashboardSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(best) = &snapshot.best_time {
        lines.push(format!(
            "O melhor horário é o das **{}**, com média de {:.1} alunos/prof.",
            best.time_slot, best.mean_ratio
        ));
    }

    if let Some(best) = &snapshot.best_session {
        lines.push(format!(
            "O destaque positivo vai para a aula das **{} ({})** em {} com a equipe **{}**, que atingiu {:.1} alunos/prof.",
            best.time_slot, best.class_type, best.session_date, best.instructors, best.occupancy_ratio
        ));
    }

    if let Some(top) = &snapshot.top_instructor {
        lines.push(format!(
            "**{}** lidera o ranking de horas com {} aulas e {} presenças.",
            top.name, top.session_count, top.total_attendees
        ));
    }

    if let Some(worst) = snapshot.worst_session.as_ref().filter(|s| s.is_alert()) {
        lines.push(format!(
            "Por outro lado, sugiro revisar a estratégia para as **{}**, especificamente as aulas de **{}**, que tiveram a menor adesão.",
            worst.time_slot, worst.class_type
        ));
    }

    lines
}

fn trend_statement(snapshot: &DashboardSnapshot) -> Option<String> {
    let trend = snapshot.trend.as_ref()?;
    let comparison = match trend.direction {
        TrendDirection::Improving => "Tendência de alta",
        TrendDirection::Declining => "Tendência de queda",
        TrendDirection::Stable => "Tendência estável",
    };
    Some(format!(
        "{comparison}: a média dos últimos {} dias é de {:.1} alunos/prof, contra {:.1} no período todo.",
        trend.recent_days, trend.recent_mean, trend.overall_mean
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::build_snapshot;
    use crate::config::AnalysisConfig;
    use crate::models::AttendanceRecord;
    use crate::sessions::tests::row;
    use crate::sessions::{group_sessions, SessionFilter};

    fn narrate(rows: &[AttendanceRecord]) -> Narrative {
        let sessions = group_sessions(rows, &SessionFilter::default());
        build_narrative(&build_snapshot(&sessions, &AnalysisConfig::default()))
    }

    fn analysis(narrative: &Narrative) -> (&str, &str, &[String], Option<&str>) {
        match narrative {
            Narrative::Analysis {
                headline,
                alerts,
                highlights,
                trend,
            } => (
                headline.as_str(),
                alerts.as_str(),
                highlights.as_slice(),
                trend.as_deref(),
            ),
            Narrative::InsufficientData => panic!("expected an analysis"),
        }
    }

    #[test]
    fn empty_period_returns_fixed_message() {
        let narrative = narrate(&[]);
        assert_eq!(narrative, Narrative::InsufficientData);
        assert_eq!(narrative.to_string(), INSUFFICIENT_DATA);
    }

    #[test]
    fn headline_judges_mean_below_normal_band_as_loss() {
        let mut rows = vec![
            row("01/03/2024", "05h", "Geral", "A, B, C", "S1"),
            row("01/03/2024", "06h", "Geral", "A, B, C", "S2"),
        ];
        for n in 0..25 {
            rows.push(row("01/03/2024", "07h", "Geral", "A, B, C", &format!("T{n}")));
        }
        let narrative = narrate(&rows);
        let (headline, ..) = analysis(&narrative);
        assert!(headline.contains("requer atenção imediata"));
        assert!(headline.contains("**3.0 alunos/prof**"));
    }

    #[test]
    fn loss_headline_and_critical_slot() {
        let rows = vec![
            row("01/03/2024", "05h", "Geral", "Ana", "S1"),
            row("01/03/2024", "06h", "Geral", "Bruno", "S2"),
            row("01/03/2024", "06h", "Geral", "Bruno", "S3"),
            row("01/03/2024", "06h", "Geral", "Bruno", "S4"),
        ];
        let narrative = narrate(&rows);
        let (headline, alerts, highlights, trend) = analysis(&narrative);

        assert!(headline.contains("**2 aulas**"));
        assert!(headline.contains("**4 presenças**"));
        assert!(headline.contains("atenção imediata"));
        assert!(headline.contains("2.0 alunos/prof"));
        assert!(alerts.contains("**1 aulas**"));
        assert!(alerts.contains("50%"));
        assert!(alerts.contains("**05h**"));
        assert!(highlights.iter().any(|h| h.contains("melhor horário é o das **06h**")));
        assert!(highlights.iter().any(|h| h.contains("revisar a estratégia para as **05h**")));
        assert!(trend.is_none());
    }

    #[test]
    fn healthy_period_without_alerts() {
        let rows: Vec<_> = ["S1", "S2", "S3", "S4"]
            .iter()
            .map(|s| row("01/03/2024", "07h", "Geral", "Ana", s))
            .collect();
        let narrative = narrate(&rows);
        let (headline, alerts, highlights, _) = analysis(&narrative);

        assert!(headline.contains("saudável"));
        assert!(alerts.contains("Nenhuma aula operou no vermelho"));
        assert!(highlights.iter().any(|h| h.contains("**Ana** lidera")));
        assert!(!highlights.iter().any(|h| h.contains("revisar")));
    }

    #[test]
    fn over_capacity_is_an_opportunity() {
        let rows: Vec<_> = ["S1", "S2", "S3", "S4", "S5"]
            .iter()
            .map(|s| row("01/03/2024", "18h", "Geral", "Ana", s))
            .collect();
        let narrative = narrate(&rows);
        let (headline, alerts, _, _) = analysis(&narrative);

        assert!(headline.contains("Performance excelente"));
        assert!(alerts.contains("**1 turmas superlotadas**"));
    }

    #[test]
    fn vip_period_judged_with_vip_thresholds() {
        let rows = vec![
            row("01/03/2024", "07h", "VIP", "Ana", "S1"),
            row("01/03/2024", "07h", "VIP", "Ana", "S2"),
        ];
        let narrative = narrate(&rows);
        let (headline, alerts, _, _) = analysis(&narrative);
        assert!(headline.contains("lucrativa"));
        assert!(alerts.contains("Nenhuma aula"));
    }

    #[test]
    fn trend_paragraph_when_enough_days() {
        let mut rows = Vec::new();
        for day in ["01/03/2024", "02/03/2024", "03/03/2024"] {
            for student in ["S1", "S2", "S3", "S4", "S5", "S6"] {
                rows.push(row(day, "07h", "Geral", "Ana", student));
            }
        }
        for day in ["04/03/2024", "05/03/2024", "06/03/2024"] {
            rows.push(row(day, "07h", "Geral", "Ana", "S1"));
        }
        let narrative = narrate(&rows);
        let (_, _, _, trend) = analysis(&narrative);
        let trend = trend.unwrap();
        assert!(trend.starts_with("Tendência de queda"));
        assert!(trend.contains("últimos 3 dias"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let rows = vec![
            row("01/03/2024", "05h", "Geral", "Ana e Peu", "S1"),
            row("02/03/2024", "06h", "VIP", "Peu", "S2"),
            row("02/03/2024", "06h", "VIP", "Peu", "S3"),
        ];
        assert_eq!(narrate(&rows).to_string(), narrate(&rows).to_string());
    }
}
