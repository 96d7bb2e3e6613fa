use axum::{response::Html, routing::get, Router};

// Demo front-desk page; it calls /ask with the free-tier demo key.
const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Atlas Auto Repairs</title>
  <style>
    body {
      font-family: Arial, sans-serif;
      background: #f4f4f4;
      display: flex;
      justify-content: center;
      align-items: center;
      height: 100vh;
    }
    .box {
      background: white;
      padding: 30px;
      border-radius: 8px;
      width: 420px;
      box-shadow: 0 2px 10px rgba(0,0,0,0.1);
    }
    input, button {
      width: 100%;
      padding: 10px;
      margin-top: 10px;
      font-size: 14px;
    }
    pre {
      background: #eee;
      padding: 10px;
      margin-top: 10px;
      white-space: pre-wrap;
    }
  </style>
</head>
<body>
  <div class="box">
    <h2>Atlas Auto Repairs</h2>
    <p>Ask our virtual front desk a question:</p>
    <input id="q" placeholder="Do you do brake inspections?" />
    <button onclick="ask()">Ask</button>
    <pre id="out"></pre>
  </div>
  <script>
    function ask() {
      fetch("/ask", {
        method: "POST",
        headers: {
          "Content-Type": "application/json",
          "x-api-key": "atlas-demo-key"
        },
        body: JSON.stringify({ question: document.getElementById("q").value })
      })
        .then(r => r.json())
        .then(d => {
          document.getElementById("out").textContent = d.reply || d.error;
        })
        .catch(() => {
          document.getElementById("out").textContent = "Error contacting server.";
        });
    }
  </script>
</body>
</html>
"#;

pub fn home_router() -> Router {
    Router::new().route("/", get(home))
}

pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}
